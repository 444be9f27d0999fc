//! Refund policy lookup and rule selection.

use super::errors::PolicyError;
use super::models::RefundRule;
use crate::booking::{BookingMode, Property};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// Source of active refund rules
#[async_trait]
pub trait RefundPolicyLookup: Send + Sync {
    /// Active rules for a property and mode, largest threshold first
    async fn active_rules(
        &self,
        property: Property,
        mode: BookingMode,
    ) -> Result<Vec<RefundRule>, PolicyError>;
}

/// Rule with the largest threshold not above `days_before_checkin`
///
/// Rules may come in any order. The smallest threshold also covers the days
/// between it and checkin, so a policy with any rule matches every cancellation
/// made up to checkin day. Returns `None` after checkin or without rules.
pub fn select_rule(rules: &[RefundRule], days_before_checkin: i64) -> Option<RefundRule> {
    if days_before_checkin < 0 {
        return None;
    }

    rules
        .iter()
        .filter(|rule| i64::from(rule.days_before_checkin) <= days_before_checkin)
        .max_by_key(|rule| rule.days_before_checkin)
        .or_else(|| rules.iter().min_by_key(|rule| rule.days_before_checkin))
        .copied()
}

/// Rules stored in `refund_policy_rules`
#[derive(Clone)]
pub struct PgRefundPolicy {
    pool: Arc<PgPool>,
}

impl PgRefundPolicy {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefundPolicyLookup for PgRefundPolicy {
    async fn active_rules(
        &self,
        property: Property,
        mode: BookingMode,
    ) -> Result<Vec<RefundRule>, PolicyError> {
        let rows: Vec<(i32, i32)> = sqlx::query_as(
            r#"
            SELECT days_before_checkin, refund_percentage
            FROM refund_policy_rules
            WHERE property = $1 AND booking_mode = $2 AND active
            ORDER BY days_before_checkin DESC
            "#,
        )
        .bind(property.as_str())
        .bind(mode.as_str())
        .fetch_all(self.pool.as_ref())
        .await
        .map_err(|e| PolicyError::Unavailable(e.to_string()))?;

        rows.into_iter()
            .map(|(days, percentage)| {
                if !(0..=100).contains(&percentage) {
                    return Err(PolicyError::InvalidRule(format!(
                        "{percentage}% at {days} days for {property}/{mode}"
                    )));
                }
                Ok(RefundRule::new(days, percentage))
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
struct CachedRules {
    version: u64,
    rules: Arc<Vec<RefundRule>>,
}

/// Read-through cache over another policy lookup
///
/// Entries are stamped with the cache version current when they were loaded;
/// [`CachedRefundPolicy::invalidate`] bumps the version so every entry is reloaded
/// on its next read.
pub struct CachedRefundPolicy {
    inner: Arc<dyn RefundPolicyLookup>,
    version: AtomicU64,
    entries: RwLock<HashMap<(Property, BookingMode), CachedRules>>,
}

impl CachedRefundPolicy {
    pub fn new(inner: Arc<dyn RefundPolicyLookup>) -> Self {
        Self {
            inner,
            version: AtomicU64::new(0),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Current cache version
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    /// Drop every cached rule set after a policy change
    pub fn invalidate(&self) -> u64 {
        let version = self.version.fetch_add(1, Ordering::AcqRel) + 1;
        log::debug!("Refund policy cache invalidated (version {version})");
        version
    }
}

#[async_trait]
impl RefundPolicyLookup for CachedRefundPolicy {
    async fn active_rules(
        &self,
        property: Property,
        mode: BookingMode,
    ) -> Result<Vec<RefundRule>, PolicyError> {
        let key = (property, mode);
        let version = self.version();

        {
            let entries = self.entries.read().await;
            if let Some(cached) = entries.get(&key).filter(|c| c.version == version) {
                return Ok(cached.rules.as_ref().clone());
            }
        }

        let rules = self.inner.active_rules(property, mode).await?;

        // A concurrent invalidate leaves this entry stale, so it is reloaded next time
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CachedRules {
                version,
                rules: Arc::new(rules.clone()),
            },
        );

        Ok(rules)
    }
}
