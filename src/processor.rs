use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use reqwest::Client;
use serde_json::Value;

use crate::auth::{self, AuthError};
use crate::config::{Endpoints, DAILY_CLAIM_RULE, REFERRAL_CODE};
use crate::console::Console;
use crate::models::MiningDetails;
use crate::network_client::{self, account_headers};
use crate::retry::{with_retry, RetryPolicy};
use crate::wallet::{Account, MessageSigner};

/// Everything an account pass needs, passed explicitly instead of living in globals.
#[derive(Debug, Clone)]
pub struct Context {
    pub client: Client,
    pub endpoints: Endpoints,
    pub retry: RetryPolicy,
    pub console: Console,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimDecision {
    Claim,
    NotYet { next_claim_ms: i64 },
    NothingToClaim,
}

/// Decides whether to call the credit claim endpoint.
///
/// The "next claim" time is read from `lastClaimAtTimestampMs` (there is no
/// separate field) and that millisecond value is compared with `now_secs`.
/// Once any claim is recorded this almost never passes, so the server is
/// effectively the only cooldown authority.
pub fn claim_decision(mining: &MiningDetails, now_secs: i64) -> ClaimDecision {
    let pool = mining.claim_pool_amount.unwrap_or(0.0);
    if pool <= 0.0 {
        return ClaimDecision::NothingToClaim;
    }
    match mining.last_claim_at_timestamp_ms {
        None | Some(0) => ClaimDecision::Claim,
        Some(next_claim_ms) if next_claim_ms < now_secs => ClaimDecision::Claim,
        Some(next_claim_ms) => ClaimDecision::NotYet { next_claim_ms },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MiningOutcome {
    Claimed(Option<Value>),
    ClaimFailed,
    NotYet { next_claim_ms: i64 },
    NothingToClaim,
}

/// What happened to one account during a pass.
#[derive(Debug, Default)]
pub struct AccountReport {
    pub address: Option<String>,
    pub logged_in: bool,
    pub profile_line: Option<String>,
    pub mining: Option<MiningOutcome>,
    pub check_ins: Vec<String>,
}

/// Logs in with `private_key` and runs referral, profile, mining claim and daily
/// check-in, strictly in that order. Failures are reported, never propagated.
pub async fn process_account(ctx: &Context, private_key: &str) -> AccountReport {
    let console = &ctx.console;
    let mut report = AccountReport::default();

    let account = match Account::from_private_key(private_key) {
        Ok(account) => account,
        Err(e) => {
            console.error(&format!("[ERROR] {}", e));
            return report;
        }
    };
    report.address = Some(account.address());
    console.account_banner(&account.masked_address());

    let headers = account_headers();
    let store = match auth::login(ctx, &headers, &account).await {
        Ok(store) => store,
        Err(AuthError::NonceUnavailable) => {
            console.error("[LOGIN] Failed to fetch nonce");
            return report;
        }
        Err(e) => {
            debug!("[LOGIN] {}", e);
            console.error("[LOGIN] Failed to verify/login");
            return report;
        }
    };
    report.logged_in = true;
    console.success("[LOGIN] Success");

    let (client, endpoints, store_ref, headers_ref) = (&ctx.client, &ctx.endpoints, &store, &headers);

    // Best effort; the result does not gate anything.
    let _ = with_retry(ctx.retry, "verify referral", move || {
        network_client::verify_referral(client, endpoints, headers_ref, store_ref, REFERRAL_CODE)
    })
    .await;

    let profile = with_retry(ctx.retry, "fetch user data", move || {
        network_client::fetch_user(client, endpoints, headers_ref, store_ref)
    })
    .await
    .ok()
    .and_then(|user| user.data);
    let Some(profile) = profile else {
        console.error("[USER] Failed to fetch profile");
        return report;
    };

    let points = profile.points.unwrap_or(0.0);
    let credits = profile.credits.unwrap_or(0.0);
    let line = console.profile_line(points, credits);
    println!("{}", line);
    report.profile_line = Some(line);

    let mining = profile.mining_details.unwrap_or_default();
    let now_secs = Utc::now().timestamp();
    let outcome = match claim_decision(&mining, now_secs) {
        ClaimDecision::Claim => {
            let claim = with_retry(ctx.retry, "claim credits", move || {
                network_client::claim_credits(client, endpoints, headers_ref, store_ref)
            })
            .await
            .ok();
            match claim.and_then(|c| c.claimed_amount) {
                Some(amount) => {
                    console.success(&format!("[MINING] Claimed {} $NITRO", display_value(&amount)));
                    MiningOutcome::Claimed(Some(amount))
                }
                None => {
                    console.warning("[MINING] Claim attempt returned no amount");
                    MiningOutcome::ClaimFailed
                }
            }
        }
        ClaimDecision::NotYet { next_claim_ms } => {
            let when = DateTime::<Utc>::from_timestamp_millis(next_claim_ms)
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
                .unwrap_or_else(|| next_claim_ms.to_string());
            console.warning(&format!("[MINING] Not time yet. Next claim at {}", when));
            MiningOutcome::NotYet { next_claim_ms }
        }
        ClaimDecision::NothingToClaim => {
            console.notice("[MINING] No available credits to claim");
            MiningOutcome::NothingToClaim
        }
    };
    report.mining = Some(outcome);

    let rules = with_retry(ctx.retry, "get loyalty rules", move || {
        network_client::fetch_loyalty_rules(client, endpoints, headers_ref, store_ref, DAILY_CLAIM_RULE)
    })
    .await
    .ok()
    .map(|body| body.into_rules())
    .unwrap_or_default();
    info!("[CHECK-IN] {} {} rule(s)", rules.len(), DAILY_CLAIM_RULE);

    for rule in &rules {
        let Some(rule_id) = rule.claimable_id() else {
            continue;
        };
        debug!("[CHECK-IN] claiming rule {} {:?}", rule_id, rule.metadata);
        let label = format!("claim loyalty {}", rule_id);
        let claimed = with_retry(ctx.retry, &label, move || {
            network_client::claim_loyalty_rule(client, endpoints, headers_ref, store_ref, rule_id)
        })
        .await
        .ok();
        if let Some(message) = claimed.and_then(|c| c.message).filter(is_truthy) {
            let message = display_value(&message);
            console.success(&format!("[CHECK-IN] {}", message));
            report.check_ins.push(message);
        }
    }

    report
}

/// Strings print without JSON quotes.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `null`, `false`, `""` and `0` carry nothing worth printing.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
pub(crate) fn test_context(server: &wiremock::MockServer, client: Client) -> Context {
    let base = url::Url::parse(&server.uri()).unwrap();
    Context {
        client,
        endpoints: Endpoints::new(base.clone(), base),
        retry: RetryPolicy {
            retries: 3,
            delay: std::time::Duration::from_millis(10),
        },
        console: Console::default(),
    }
}
