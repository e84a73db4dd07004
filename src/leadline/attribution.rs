// SPDX-License-Identifier: MIT

//! First-touch attribution from deep-link start parameters.
//!
//! Two token shapes are recognized: `ref_<user id>` for referrals and
//! `buyer_<name>_<suffix>[_<click id>]` for paid traffic. Anything else
//! resolves to no attribution — parsing is best-effort and never blocks
//! entry into the form.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::leadline::storage::SessionStore;

/// Where a submission is credited. Captured once at session creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Attribution {
    /// Invited by an existing lead.
    Referral { referrer: i64 },
    /// Paid traffic tagged with a buyer campaign code; ad networks append
    /// a click identifier after the code.
    Buyer {
        code: String,
        click_id: Option<String>,
    },
}

impl Attribution {
    /// Aggregation key for analytics.
    pub fn bucket(&self) -> String {
        match self {
            Attribution::Referral { .. } => "referral".to_string(),
            Attribution::Buyer { code, .. } => format!("buyer:{}", code),
        }
    }
}

/// Split a buyer token into `(campaign code, trailing click id)`.
///
/// Codes have the shape `buyer_<name>_<suffix>`; everything after the third
/// underscore-separated segment is the click id the ad network appended.
fn split_buyer_token(param: &str) -> Option<(String, Option<String>)> {
    let segments: Vec<&str> = param.split('_').collect();
    if segments.len() < 3 || segments[0] != "buyer" {
        return None;
    }
    if segments[1].is_empty() || segments[2].is_empty() {
        return None;
    }
    let code = segments[..3].join("_");
    let click_id = if segments.len() > 3 {
        let rest = segments[3..].join("_");
        if rest.is_empty() {
            None
        } else {
            Some(rest)
        }
    } else {
        None
    };
    Some((code, click_id))
}

fn parse_referrer(param: &str) -> Option<i64> {
    let id = param.strip_prefix("ref_")?;
    id.parse::<i64>().ok().filter(|id| *id > 0)
}

/// Resolves raw start parameters against the stores of known sources.
pub struct AttributionResolver {
    store: Arc<dyn SessionStore>,
}

impl AttributionResolver {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Resolve an optional start parameter for `user_id`.
    ///
    /// Unknown codes, malformed tokens, self-referrals, and storage errors
    /// all collapse to `None`.
    pub async fn resolve(&self, user_id: i64, param: Option<&str>) -> Option<Attribution> {
        let param = param?.trim();
        if param.is_empty() {
            return None;
        }

        if let Some(referrer) = parse_referrer(param) {
            if referrer == user_id {
                log::debug!("ignoring self-referral from user {}", user_id);
                return None;
            }
            // Only users who completed the form can refer others.
            match self.store.has_submission(referrer).await {
                Ok(true) => return Some(Attribution::Referral { referrer }),
                Ok(false) => {
                    log::debug!("referral token names unknown referrer {}", referrer);
                    return None;
                }
                Err(e) => {
                    log::warn!("referral lookup failed, dropping attribution: {}", e);
                    return None;
                }
            }
        }

        if let Some((code, click_id)) = split_buyer_token(param) {
            match self.store.buyer_exists(&code).await {
                Ok(true) => return Some(Attribution::Buyer { code, click_id }),
                Ok(false) => {
                    log::debug!("unknown buyer code in start parameter: {}", code);
                    return None;
                }
                Err(e) => {
                    log::warn!("buyer lookup failed, dropping attribution: {}", e);
                    return None;
                }
            }
        }

        log::debug!("unrecognized start parameter: {:?}", param);
        None
    }
}
