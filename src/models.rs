use log::warn;
use serde::de::{DeserializeOwned, Deserializer, IgnoredAny};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Default, Deserialize)]
pub struct NonceResponse {
    pub nonce: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyRequest<'a> {
    pub message: &'a str,
    pub signature: &'a str,
}

/// Body of `POST /auth/verify`. Identifier fields are kept as raw JSON so they
/// are echoed back into the session cookie exactly as the server sent them.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_at: Option<Value>,
    pub address: Option<String>,
    pub token_data: Option<TokenData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenData {
    pub user_id: Option<Value>,
    pub snag_user_id: Option<Value>,
    pub chain_id: Option<Value>,
    pub new_account: Option<bool>,
}

/// Verify response together with the raw values of its `Set-Cookie` headers.
#[derive(Debug)]
pub struct VerifyOutcome {
    pub body: VerifyResponse,
    pub cookies: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralRequest<'a> {
    pub referral_code: &'a str,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserResponse {
    #[serde(default, deserialize_with = "lenient_object")]
    pub data: Option<UserProfile>,
}

/// Amounts and timestamps are accepted as JSON numbers or numeric strings. A value
/// of any other shape is logged and treated as absent rather than failing the
/// whole profile.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub points: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub credits: Option<f64>,
    #[serde(default, deserialize_with = "lenient_object")]
    pub mining_details: Option<MiningDetails>,
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningDetails {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub claim_pool_amount: Option<f64>,
    #[serde(default, deserialize_with = "lenient_millis")]
    pub last_claim_at_timestamp_ms: Option<i64>,
}

fn number_from(value: &Value) -> Option<f64> {
    match value {
        Value::Null => None,
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => Some(n),
            _ => {
                warn!("[API] ignoring non-numeric amount {:?}", s);
                None
            }
        },
        other => {
            warn!("[API] ignoring non-numeric amount {}", other);
            None
        }
    }
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(number_from(&value))
}

fn lenient_millis<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<i64>, D::Error> {
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_i64()
        .or_else(|| number_from(&value).map(|n| n.trunc() as i64)))
}

/// A nested object that does not decode as `T` is absent, not an error.
fn lenient_object<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value) {
        Ok(inner) => Ok(Some(inner)),
        Err(e) => {
            warn!("[API] ignoring malformed object: {}", e);
            Ok(None)
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimCreditsResponse {
    pub claimed_amount: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoyaltyRule {
    pub id: Option<Value>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl LoyaltyRule {
    /// The rule id, unless it is missing, null, empty or zero.
    pub fn claimable_id(&self) -> Option<&Value> {
        match self.id.as_ref()? {
            Value::String(s) if s.is_empty() => None,
            Value::Number(n) if n.as_f64() == Some(0.0) => None,
            Value::String(_) | Value::Number(_) => self.id.as_ref(),
            _ => None,
        }
    }
}

/// The rules endpoint is expected to return an array; anything else means "no rules".
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum LoyaltyRulesResponse {
    Rules(Vec<Value>),
    Other(IgnoredAny),
}

impl Default for LoyaltyRulesResponse {
    fn default() -> Self {
        LoyaltyRulesResponse::Rules(Vec::new())
    }
}

impl LoyaltyRulesResponse {
    /// Object entries become rules; `null`, strings and other non-objects are skipped
    /// one by one without affecting their neighbours.
    pub fn into_rules(self) -> Vec<LoyaltyRule> {
        match self {
            LoyaltyRulesResponse::Rules(entries) => entries
                .into_iter()
                .filter(Value::is_object)
                .filter_map(|entry| serde_json::from_value(entry).ok())
                .collect(),
            LoyaltyRulesResponse::Other(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimRuleRequest<'a> {
    pub rule_ids: [&'a Value; 1],
}

#[derive(Debug, Default, Deserialize)]
pub struct ClaimRuleResponse {
    pub message: Option<Value>,
}
