use log::{debug, warn};
use once_cell::sync::Lazy;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue, ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION,
    CONTENT_LENGTH, COOKIE, ORIGIN, REFERER, SET_COOKIE, USER_AGENT,
};
use reqwest::{Client, Error as ReqwestError, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{Endpoints, REQUEST_TIMEOUT, SITE_ORIGIN};
use crate::models::{
    ClaimCreditsResponse, ClaimRuleRequest, ClaimRuleResponse, LoyaltyRulesResponse, NonceResponse,
    ReferralRequest, UserResponse, VerifyOutcome, VerifyRequest, VerifyResponse,
};
use crate::session::SessionStore;
use crate::utils::pick_user_agent;

const ACCEPT_LANGUAGE_VALUE: &str = "id-ID,id;q=0.9,en-US;q=0.8,en;q=0.7";

static BASE_HEADERS: Lazy<HeaderMap> = Lazy::new(|| {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    headers.insert(ORIGIN, HeaderValue::from_static(SITE_ORIGIN));
    headers.insert(REFERER, HeaderValue::from_static("https://community.nitrograph.com/"));
    headers.insert(HeaderName::from_static("sec-fetch-dest"), HeaderValue::from_static("empty"));
    headers.insert(HeaderName::from_static("sec-fetch-mode"), HeaderValue::from_static("cors"));
    headers.insert(HeaderName::from_static("sec-fetch-site"), HeaderValue::from_static("same-site"));
    headers
});

#[derive(Debug)]
pub enum NetworkError {
    Reqwest(ReqwestError),
    ApiError { status: StatusCode, message: String },
    InvalidHeader(InvalidHeaderValue),
}

impl From<ReqwestError> for NetworkError {
    fn from(err: ReqwestError) -> NetworkError {
        NetworkError::Reqwest(err)
    }
}

impl From<InvalidHeaderValue> for NetworkError {
    fn from(err: InvalidHeaderValue) -> NetworkError {
        NetworkError::InvalidHeader(err)
    }
}

impl std::fmt::Display for NetworkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkError::Reqwest(e) => write!(f, "HTTP request error: {}", e),
            NetworkError::ApiError { status, message } => write!(f, "API error ({}): {}", status, message),
            NetworkError::InvalidHeader(e) => write!(f, "Invalid header value: {}", e),
        }
    }
}

impl std::error::Error for NetworkError {}

/// Builds the one client shared by every account and every pass.
///
/// Cookies set by any response land in the shared jar. Calls that need explicit
/// session credentials set their own `Cookie` header, which takes precedence.
pub fn build_client() -> Result<Client, NetworkError> {
    let mut headers = BASE_HEADERS.clone();
    headers.insert(USER_AGENT, HeaderValue::from_static(pick_user_agent()));

    let client = Client::builder()
        .default_headers(headers)
        .cookie_provider(Arc::new(reqwest::cookie::Jar::default()))
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    Ok(client)
}

/// Headers every request of one account carries on top of the client defaults.
pub fn account_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));
    headers.insert(USER_AGENT, HeaderValue::from_static(pick_user_agent()));
    headers
}

fn with_cookie(request: RequestBuilder, cookie: &str) -> Result<RequestBuilder, NetworkError> {
    Ok(request.header(COOKIE, HeaderValue::from_str(cookie)?))
}

fn with_bearer(request: RequestBuilder, store: &SessionStore) -> Result<RequestBuilder, NetworkError> {
    Ok(request.header(AUTHORIZATION, HeaderValue::from_str(&store.bearer())?))
}

/// Sends `request`, treating anything but 2xx as a failure, and returns the raw response.
async fn send(request: RequestBuilder, label: &str) -> Result<reqwest::Response, NetworkError> {
    let start_time = Instant::now();
    let response_result = request.send().await;
    debug!("[TIMING] {} took {:.2?}", label, start_time.elapsed());

    let response = response_result?;
    if !response.status().is_success() {
        let status_code = response.status();
        let error_text = match response.text().await {
            Ok(text) => text,
            Err(e) => format!("Failed to read error body (detail: {}). Original status: {}", e, status_code),
        };
        return Err(NetworkError::ApiError {
            status: status_code,
            message: format!("{} failed. Server response: {}", label, error_text),
        });
    }
    Ok(response)
}

/// Decodes a 2xx body. A body that does not match `T` is not a failed request:
/// it is logged and read as `T::default()`, so only transport errors and non-2xx
/// statuses ever reach the retry loop.
async fn read_json<T: DeserializeOwned + Default>(response: reqwest::Response, label: &str) -> Result<T, NetworkError> {
    let response_text = response.text().await?;
    debug!("[API] {} response body: {}", label, response_text);
    match serde_json::from_str(&response_text) {
        Ok(body) => Ok(body),
        Err(e) => {
            warn!("[API] {} returned an unexpected body ({}), reading it as empty", label, e);
            Ok(T::default())
        }
    }
}

/// `GET {auth}/auth/nonce`
pub async fn fetch_nonce(
    client: &Client,
    endpoints: &Endpoints,
    headers: &HeaderMap,
) -> Result<NonceResponse, NetworkError> {
    let url = endpoints.auth("auth/nonce");
    debug!("[API] Sending GET to {}", url);
    let response = send(client.get(&url).headers(headers.clone()), "fetch nonce").await?;
    read_json(response, "fetch nonce").await
}

/// `POST {auth}/auth/verify` with the signed message. Returns the body and the
/// raw value of every `Set-Cookie` header.
pub async fn submit_signature(
    client: &Client,
    endpoints: &Endpoints,
    headers: &HeaderMap,
    message: &str,
    signature: &str,
) -> Result<VerifyOutcome, NetworkError> {
    let url = endpoints.auth("auth/verify");
    debug!("[API] Sending POST to {}", url);
    let request = client
        .post(&url)
        .headers(headers.clone())
        .json(&VerifyRequest { message, signature });
    let response = send(request, "verify/login").await?;

    let cookies = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect::<Vec<_>>();
    debug!("[API] verify/login set {} cookie(s)", cookies.len());

    let body: VerifyResponse = read_json(response, "verify/login").await?;
    Ok(VerifyOutcome { body, cookies })
}

/// `POST {community}/referrals/verify` with both session cookies. The body is not
/// interpreted, so it is returned as text.
pub async fn verify_referral(
    client: &Client,
    endpoints: &Endpoints,
    headers: &HeaderMap,
    store: &SessionStore,
    referral_code: &str,
) -> Result<String, NetworkError> {
    let url = endpoints.community("referrals/verify");
    debug!("[API] Sending POST to {}", url);
    let request = client
        .post(&url)
        .headers(headers.clone())
        .json(&ReferralRequest { referral_code });
    let request = with_cookie(request, &store.community_cookie())?;
    let response = send(request, "verify referral").await?;
    let response_text = response.text().await?;
    debug!("[API] verify referral response body: {}", response_text);
    Ok(response_text)
}

/// `GET {auth}/users/me` with the bearer token and the v1 cookie only.
pub async fn fetch_user(
    client: &Client,
    endpoints: &Endpoints,
    headers: &HeaderMap,
    store: &SessionStore,
) -> Result<UserResponse, NetworkError> {
    let url = endpoints.auth("users/me");
    debug!("[API] Sending GET to {}", url);
    let request = with_bearer(client.get(&url).headers(headers.clone()), store)?;
    let request = with_cookie(request, store.auth_cookie())?;
    let response = send(request, "fetch user data").await?;
    read_json(response, "fetch user data").await
}

/// `POST {auth}/credits/claim` with an empty body, the bearer token and the v1 cookie.
pub async fn claim_credits(
    client: &Client,
    endpoints: &Endpoints,
    headers: &HeaderMap,
    store: &SessionStore,
) -> Result<ClaimCreditsResponse, NetworkError> {
    let url = endpoints.auth("credits/claim");
    debug!("[API] Sending POST to {}", url);
    let request = client
        .post(&url)
        .headers(headers.clone())
        .header(CONTENT_LENGTH, "0");
    let request = with_bearer(request, store)?;
    let request = with_cookie(request, store.auth_cookie())?;
    let response = send(request, "claim credits").await?;
    read_json(response, "claim credits").await
}

/// `GET {community}/loyalties/rules?type=...` with both session cookies, no bearer.
pub async fn fetch_loyalty_rules(
    client: &Client,
    endpoints: &Endpoints,
    headers: &HeaderMap,
    store: &SessionStore,
    rule_type: &str,
) -> Result<LoyaltyRulesResponse, NetworkError> {
    let url = endpoints.community("loyalties/rules");
    debug!("[API] Sending GET to {} (type={})", url, rule_type);
    let request = client
        .get(&url)
        .headers(headers.clone())
        .query(&[("type", rule_type)]);
    let request = with_cookie(request, &store.community_cookie())?;
    let response = send(request, "get loyalty rules").await?;
    read_json(response, "get loyalty rules").await
}

/// `POST {community}/loyalties/rules` claiming a single rule id, both session cookies.
pub async fn claim_loyalty_rule(
    client: &Client,
    endpoints: &Endpoints,
    headers: &HeaderMap,
    store: &SessionStore,
    rule_id: &Value,
) -> Result<ClaimRuleResponse, NetworkError> {
    let url = endpoints.community("loyalties/rules");
    debug!("[API] Sending POST to {} (rule {})", url, rule_id);
    let request = client
        .post(&url)
        .headers(headers.clone())
        .json(&ClaimRuleRequest { rule_ids: [rule_id] });
    let request = with_cookie(request, &store.community_cookie())?;
    let label = format!("claim loyalty {}", rule_id);
    let response = send(request, &label).await?;
    read_json(response, &label).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use url::Url;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn endpoints(server: &MockServer) -> Endpoints {
        let base = Url::parse(&server.uri()).unwrap();
        Endpoints::new(base.clone(), base)
    }

    fn store() -> SessionStore {
        SessionStore {
            session_v1: "sid=abc".into(),
            session_v4: "@nitrograph/session-v4=%7B%22token%22%3A%22t1%22%7D".into(),
            access_token: "t1".into(),
            refresh_token: "r1".into(),
        }
    }

    fn header_of(request: &Request, name: &str) -> Option<String> {
        request
            .headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    #[tokio::test]
    async fn client_sends_browser_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/nonce"))
            .and(header("origin", "https://community.nitrograph.com"))
            .and(header("referer", "https://community.nitrograph.com/"))
            .and(header("sec-fetch-site", "same-site"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "nonce": "n1" })))
            .expect(1)
            .mount(&server)
            .await;

        let client = build_client().unwrap();
        let nonce = fetch_nonce(&client, &endpoints(&server), &account_headers()).await.unwrap();
        assert_eq!(nonce.nonce.as_deref(), Some("n1"));

        let received = server.received_requests().await.unwrap();
        assert_eq!(
            header_of(&received[0], "accept-language").as_deref(),
            Some(ACCEPT_LANGUAGE_VALUE)
        );
        let ua = header_of(&received[0], "user-agent").unwrap();
        assert!(crate::utils::USER_AGENTS.contains(&ua.as_str()));
    }

    #[tokio::test]
    async fn non_2xx_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/nonce"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = build_client().unwrap();
        let err = fetch_nonce(&client, &endpoints(&server), &account_headers())
            .await
            .unwrap_err();
        match err {
            NetworkError::ApiError { status, .. } => assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn verify_collects_set_cookie_pairs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/verify"))
            .and(body_json(serde_json::json!({ "message": "m", "signature": "0xsig" })))
            .respond_with(
                ResponseTemplate::new(200)
                    .append_header("set-cookie", "sid=abc; Path=/")
                    .append_header("set-cookie", "other=1; HttpOnly")
                    .set_body_json(serde_json::json!({ "token": "t1" })),
            )
            .mount(&server)
            .await;

        let client = build_client().unwrap();
        let outcome = submit_signature(&client, &endpoints(&server), &account_headers(), "m", "0xsig")
            .await
            .unwrap();
        assert_eq!(outcome.body.token.as_deref(), Some("t1"));
        assert_eq!(outcome.cookies, vec!["sid=abc; Path=/", "other=1; HttpOnly"]);
    }

    #[tokio::test]
    async fn each_call_sends_its_own_credentials() {
        let server = MockServer::start().await;
        let ok = ResponseTemplate::new(200).set_body_json(serde_json::json!({}));
        Mock::given(method("POST"))
            .and(path("/referrals/verify"))
            .and(body_json(serde_json::json!({ "referralCode": "CODE" })))
            .respond_with(ok.clone())
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/me"))
            .respond_with(ok.clone())
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/credits/claim"))
            .respond_with(ok.clone())
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/loyalties/rules"))
            .and(query_param("type", "DAILY_CLAIM"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/loyalties/rules"))
            .and(body_json(serde_json::json!({ "ruleIds": ["r1"] })))
            .respond_with(ok)
            .mount(&server)
            .await;

        let client = build_client().unwrap();
        let endpoints = endpoints(&server);
        let headers = account_headers();
        let store = store();

        verify_referral(&client, &endpoints, &headers, &store, "CODE").await.unwrap();
        fetch_user(&client, &endpoints, &headers, &store).await.unwrap();
        claim_credits(&client, &endpoints, &headers, &store).await.unwrap();
        fetch_loyalty_rules(&client, &endpoints, &headers, &store, "DAILY_CLAIM")
            .await
            .unwrap();
        claim_loyalty_rule(&client, &endpoints, &headers, &store, &Value::from("r1"))
            .await
            .unwrap();

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 5);
        let both = store.community_cookie();
        let expected: [(Option<&str>, &str); 5] = [
            (None, both.as_str()),
            (Some("Bearer t1"), "sid=abc"),
            (Some("Bearer t1"), "sid=abc"),
            (None, both.as_str()),
            (None, both.as_str()),
        ];
        for (request, (bearer, cookie)) in received.iter().zip(expected) {
            assert_eq!(header_of(request, "authorization").as_deref(), bearer, "{}", request.url);
            assert_eq!(header_of(request, "cookie").as_deref(), Some(cookie), "{}", request.url);
        }
        assert!(received[2].body.is_empty());
        assert_eq!(header_of(&received[2], "content-length").as_deref(), Some("0"));
    }

    #[tokio::test]
    async fn unexpected_2xx_bodies_read_as_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/credits/claim"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/verify"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .expect(1)
            .mount(&server)
            .await;

        let client = build_client().unwrap();
        let endpoints = endpoints(&server);
        let headers = account_headers();

        let claimed = claim_credits(&client, &endpoints, &headers, &store()).await.unwrap();
        assert!(claimed.claimed_amount.is_none());

        let verified = submit_signature(&client, &endpoints, &headers, "m", "0xsig").await.unwrap();
        assert!(verified.body.token.is_none());
    }
}
