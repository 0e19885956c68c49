//! Request and response value types shared by the cache, interceptor and
//! replay paths.

/// HTTP method of an intercepted or replayed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
  Get,
  Head,
  Post,
  Put,
  Patch,
  Delete,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Head => "HEAD",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Patch => "PATCH",
      Method::Delete => "DELETE",
    }
  }
}

/// Where a response came from relative to the page origin.
///
/// Only `Basic` (same-origin) responses are eligible for caching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
  /// Same-origin response
  Basic,
  /// Cross-origin response obtained via CORS
  Cors,
  /// Cross-origin response with no readable metadata
  Opaque,
}

impl ResponseKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ResponseKind::Basic => "basic",
      ResponseKind::Cors => "cors",
      ResponseKind::Opaque => "opaque",
    }
  }

  pub fn parse(s: &str) -> Self {
    match s {
      "basic" => ResponseKind::Basic,
      "cors" => ResponseKind::Cors,
      _ => ResponseKind::Opaque,
    }
  }
}

/// An outgoing request as seen by the interceptor.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  /// Absolute URL or origin-relative path, kept verbatim. The cache key is
  /// the exact (method, URL) pair with no normalization.
  pub url: String,
  pub headers: Vec<(String, String)>,
  pub body: Option<Vec<u8>>,
}

impl Request {
  pub fn get(url: impl Into<String>) -> Self {
    Self {
      method: Method::Get,
      url: url.into(),
      headers: Vec::new(),
      body: None,
    }
  }

  /// Build a JSON POST carrying the given payload.
  pub fn post_json(url: impl Into<String>, payload: &serde_json::Value) -> Self {
    Self {
      method: Method::Post,
      url: url.into(),
      headers: vec![("content-type".to_string(), "application/json".to_string())],
      body: Some(payload.to_string().into_bytes()),
    }
  }

  /// Attach a bearer-token authorization header.
  pub fn with_bearer(mut self, token: &str) -> Self {
    self
      .headers
      .push(("authorization".to_string(), format!("Bearer {}", token)));
    self
  }

  /// Path component of the URL, used for API-prefix matching.
  ///
  /// Absolute URLs are parsed; origin-relative URLs are returned as-is.
  pub fn path(&self) -> String {
    match url::Url::parse(&self.url) {
      Ok(parsed) => parsed.path().to_string(),
      Err(_) => self.url.clone(),
    }
  }
}

/// A response as stored in the cache or returned to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
  pub status: u16,
  pub kind: ResponseKind,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16) -> Self {
    Self {
      status,
      kind: ResponseKind::Basic,
      headers: Vec::new(),
      body: Vec::new(),
    }
  }

  pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
    self.body = body.into();
    self
  }

  pub fn with_kind(mut self, kind: ResponseKind) -> Self {
    self.kind = kind;
    self
  }

  /// 2xx status.
  pub fn is_ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Only a 200 same-origin response may populate the cache.
  pub fn is_cacheable(&self) -> bool {
    self.status == 200 && self.kind == ResponseKind::Basic
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_path_of_absolute_url() {
    let req = Request::get("https://app.example.com/css/styles.css?v=2");
    assert_eq!(req.path(), "/css/styles.css");
  }

  #[test]
  fn test_path_of_relative_url() {
    let req = Request::get("/api/orders/");
    assert_eq!(req.path(), "/api/orders/");
  }

  #[test]
  fn test_post_json_sets_body_and_content_type() {
    let payload = serde_json::json!({"product": 7, "quantity": 2});
    let req = Request::post_json("/api/orders/", &payload).with_bearer("tok-123");

    assert_eq!(req.method, Method::Post);
    assert!(req
      .headers
      .iter()
      .any(|(n, v)| n == "content-type" && v == "application/json"));
    assert!(req
      .headers
      .iter()
      .any(|(n, v)| n == "authorization" && v == "Bearer tok-123"));
    let body: serde_json::Value =
      serde_json::from_slice(req.body.as_deref().unwrap()).unwrap();
    assert_eq!(body, payload);
  }

  #[test]
  fn test_cacheable_requires_basic_200() {
    assert!(Response::new(200).is_cacheable());
    assert!(!Response::new(201).is_cacheable());
    assert!(!Response::new(404).is_cacheable());
    assert!(!Response::new(200).with_kind(ResponseKind::Opaque).is_cacheable());
    assert!(!Response::new(200).with_kind(ResponseKind::Cors).is_cacheable());
  }

  #[test]
  fn test_response_kind_round_trip() {
    for kind in [ResponseKind::Basic, ResponseKind::Cors, ResponseKind::Opaque] {
      assert_eq!(ResponseKind::parse(kind.as_str()), kind);
    }
    // Unknown tags degrade to the least-capable kind
    assert_eq!(ResponseKind::parse("garbage"), ResponseKind::Opaque);
  }
}
