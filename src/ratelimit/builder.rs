//! Translation from rate limit properties to bucket specifications.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::bandwidth::{BandwidthLimit, BucketSpec};
use super::plan::{BASIC_PLAN, FREE_PLAN, PROFESSIONAL_PLAN};
use super::strategy::Strategy;
use crate::config::RateLimitProperties;
use crate::error::{Result, TollgateError};

/// Builds [`BucketSpec`]s from an injected, read-only [`RateLimitProperties`].
///
/// This type is pure: it never touches a bucket and never caches a spec.
#[derive(Debug, Clone)]
pub struct BucketSpecBuilder {
    properties: Arc<RateLimitProperties>,
    /// Plans keyed by lower-cased name, sorted for stable error messages
    plans: BTreeMap<String, BandwidthLimit>,
}

impl BucketSpecBuilder {
    pub fn new(properties: Arc<RateLimitProperties>) -> Self {
        let plans = properties
            .business
            .plans
            .iter()
            .map(|(name, limit)| (name.to_lowercase(), limit.clone()))
            .collect();

        Self { properties, plans }
    }

    /// The spec shared by every AUTH caller.
    pub fn build_auth_spec(&self) -> Result<BucketSpec> {
        BucketSpec::new(Strategy::Auth, self.properties.auth.bandwidths.clone())
    }

    /// The spec for a BUSINESS caller on `plan_name` (case-insensitive).
    pub fn build_business_spec(&self, plan_name: &str) -> Result<BucketSpec> {
        let limit = self
            .plans
            .get(&plan_name.to_lowercase())
            .ok_or_else(|| TollgateError::UnknownPlan {
                plan: plan_name.to_string(),
                valid: self.plan_names(),
            })?;

        BucketSpec::new(Strategy::Business, vec![limit.clone()])
    }

    /// Build every spec the limiter can ask for, so configuration defects
    /// surface at startup instead of on the first request.
    pub fn verify(&self) -> Result<()> {
        self.properties.validate()?;
        if self.is_auth_enabled() {
            self.build_auth_spec()?;
        }
        if self.is_business_enabled() {
            for plan in [FREE_PLAN, BASIC_PLAN, PROFESSIONAL_PLAN] {
                self.build_business_spec(plan)?;
            }
        }
        Ok(())
    }

    /// Lower-cased names of every configured plan, sorted.
    pub fn plan_names(&self) -> Vec<String> {
        self.plans.keys().cloned().collect()
    }

    pub fn is_auth_enabled(&self) -> bool {
        self.properties.enabled && self.properties.auth.enabled
    }

    pub fn is_business_enabled(&self) -> bool {
        self.properties.enabled && self.properties.business.enabled
    }

    /// Path prefixes treated as AUTH-strategy endpoints.
    pub fn auth_endpoints(&self) -> &[String] {
        &self.properties.auth.endpoints
    }

    pub fn properties(&self) -> &RateLimitProperties {
        &self.properties
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::TimeUnit;

    fn builder_with(properties: RateLimitProperties) -> BucketSpecBuilder {
        BucketSpecBuilder::new(Arc::new(properties))
    }

    #[test]
    fn test_build_auth_spec_uses_all_bandwidths() {
        let builder = builder_with(RateLimitProperties::default());
        let spec = builder.build_auth_spec().unwrap();

        assert_eq!(spec.bandwidths().len(), 2);
        assert_eq!(spec.capacity(), 5);
    }

    #[test]
    fn test_build_auth_spec_rejects_empty_list() {
        let mut properties = RateLimitProperties::default();
        properties.auth.bandwidths.clear();

        let err = builder_with(properties).build_auth_spec().unwrap_err();
        assert!(matches!(err, TollgateError::EmptyBucketSpec(Strategy::Auth)));
    }

    #[test]
    fn test_build_business_spec_is_case_insensitive() {
        let mut properties = RateLimitProperties::default();
        properties.business.plans.insert(
            "Enterprise".to_string(),
            BandwidthLimit::per("enterprise", 1000, TimeUnit::Minute),
        );
        let builder = builder_with(properties);

        assert_eq!(builder.build_business_spec("FREE").unwrap().capacity(), 3);
        assert_eq!(builder.build_business_spec("enterprise").unwrap().capacity(), 1000);
        assert_eq!(builder.build_business_spec("ENTERPRISE").unwrap().capacity(), 1000);
    }

    #[test]
    fn test_unknown_plan_names_offender_and_alternatives() {
        let builder = builder_with(RateLimitProperties::default());
        let err = builder.build_business_spec("platinum").unwrap_err();

        match &err {
            TollgateError::UnknownPlan { plan, valid } => {
                assert_eq!(plan, "platinum");
                assert_eq!(valid, &vec!["basic", "free", "professional"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let message = err.to_string();
        assert!(message.contains("platinum"));
        assert!(message.contains("basic, free, professional"));
    }

    #[test]
    fn test_enabled_flags_require_global_switch() {
        let mut properties = RateLimitProperties::default();
        let builder = builder_with(properties.clone());
        assert!(builder.is_auth_enabled());
        assert!(builder.is_business_enabled());

        properties.enabled = false;
        let builder = builder_with(properties.clone());
        assert!(!builder.is_auth_enabled());
        assert!(!builder.is_business_enabled());

        properties.enabled = true;
        properties.auth.enabled = false;
        let builder = builder_with(properties);
        assert!(!builder.is_auth_enabled());
        assert!(builder.is_business_enabled());
    }

    #[test]
    fn test_verify_requires_prefix_plans() {
        assert!(builder_with(RateLimitProperties::default()).verify().is_ok());

        let mut properties = RateLimitProperties::default();
        properties.business.plans.remove("basic");
        let err = builder_with(properties.clone()).verify().unwrap_err();
        assert!(matches!(err, TollgateError::UnknownPlan { .. }));

        // Disabled strategies are not checked.
        properties.business.enabled = false;
        assert!(builder_with(properties).verify().is_ok());
    }

    #[test]
    fn test_verify_rejects_plans_differing_by_case() {
        let mut properties = RateLimitProperties::default();
        properties
            .business
            .plans
            .insert("Free".to_string(), BandwidthLimit::per("free-upper", 300, TimeUnit::Minute));

        let err = builder_with(properties).verify().unwrap_err();
        assert!(matches!(err, TollgateError::Config(ref m) if m.contains("'Free'") && m.contains("'free'")));
    }

    #[test]
    fn test_auth_endpoints_exposed() {
        let builder = builder_with(RateLimitProperties::default());
        assert!(builder
            .auth_endpoints()
            .contains(&"/api/auth/login".to_string()));
    }
}
