use crate::domain::{BodyMode, RunConfig};
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};

/// Outgoing request shape, built once per run and cloned per attempt.
#[derive(Debug, Clone)]
pub(crate) struct RequestTemplate {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

pub(crate) fn build_request_template(config: &RunConfig) -> Result<RequestTemplate, String> {
    let method = Method::from_bytes(config.method.as_bytes())
        .map_err(|err| format!("Invalid HTTP method `{}`: {err}", config.method))?;
    let url = build_url(config);
    let headers = build_header_map(config)?;
    let body = if config.body.mode == BodyMode::None || !should_send_body(&method) {
        None
    } else {
        Some(config.body.text.clone())
    };

    Ok(RequestTemplate {
        method,
        url,
        headers,
        body,
    })
}

fn build_url(config: &RunConfig) -> String {
    let enabled: Vec<_> = config
        .query_params
        .iter()
        .filter(|param| param.enabled && !param.name.is_empty())
        .collect();
    if enabled.is_empty() {
        return config.url.clone();
    }

    match Url::parse(&config.url) {
        Ok(mut url) => {
            {
                let mut pairs = url.query_pairs_mut();
                for param in &enabled {
                    pairs.append_pair(&param.name, &param.value);
                }
            }
            url.to_string()
        }
        Err(_) => {
            // Base is relative or otherwise unparseable; best-effort raw
            // concatenation rather than rejecting the run.
            let mut out = config.url.clone();
            for (idx, param) in enabled.iter().enumerate() {
                out.push(if idx == 0 && !config.url.contains('?') {
                    '?'
                } else {
                    '&'
                });
                out.push_str(&param.name);
                out.push('=');
                out.push_str(&param.value);
            }
            out
        }
    }
}

fn build_header_map(config: &RunConfig) -> Result<HeaderMap, String> {
    let mut headers = HeaderMap::new();

    for row in &config.headers {
        if !row.enabled || row.name.is_empty() {
            continue;
        }
        let name = HeaderName::from_bytes(row.name.as_bytes())
            .map_err(|err| format!("Invalid header name `{}`: {err}", row.name))?;
        let value = HeaderValue::from_str(&row.value)
            .map_err(|err| format!("Invalid header value for `{}`: {err}", row.name))?;
        headers.insert(name, value);
    }

    // Inferred Content-Type never overrides an explicit one.
    if !headers.contains_key(CONTENT_TYPE) {
        if let Some(content_type) = inferred_content_type(config.body.mode) {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        }
    }

    if let Some(auth) = &config.basic_auth {
        if !headers.contains_key(AUTHORIZATION) {
            let token = BASE64_STANDARD.encode(format!("{}:{}", auth.username, auth.password));
            let value = HeaderValue::from_str(&format!("Basic {token}"))
                .map_err(|err| format!("Invalid basic auth credentials: {err}"))?;
            headers.insert(AUTHORIZATION, value);
        }
    }

    Ok(headers)
}

fn inferred_content_type(mode: BodyMode) -> Option<&'static str> {
    match mode {
        BodyMode::Json => Some("application/json"),
        BodyMode::Form => Some("application/x-www-form-urlencoded"),
        BodyMode::None | BodyMode::Raw => None,
    }
}

fn should_send_body(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}
