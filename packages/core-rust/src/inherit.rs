//! Layered configuration inheritance.
//!
//! A template value is copied onto a candidate field only when the candidate
//! still holds the coded base value and the template holds something else.
//! A candidate explicitly set to the base value is therefore indistinguishable
//! from one that was never set.

use crate::endpoint::{EndpointConfig, HealthConfig, SecurityConfig};

/// Overlays `template` onto `candidate` when the candidate is unmodified and
/// the template is not. Returns whether the candidate changed.
fn inherit<T: PartialEq + Clone>(candidate: &mut T, base: &T, template: &T) -> bool {
    if candidate != base || template == base {
        return false;
    }
    candidate.clone_from(template);
    true
}

impl EndpointConfig {
    /// Overlays `template` onto every unmodified field, including the nested
    /// health and security settings. Does not look at `inherit_defaults`.
    ///
    /// The service config map is replaced wholesale, never merged per key.
    pub fn overlay_defaults(&mut self, template: &EndpointConfig) -> &mut Self {
        let base = EndpointConfig::default();
        let mut applied = 0_usize;
        applied += usize::from(inherit(&mut self.address, &base.address, &template.address));
        applied += usize::from(inherit(
            &mut self.default_deadline,
            &base.default_deadline,
            &template.default_deadline,
        ));
        applied += usize::from(inherit(
            &mut self.default_load_balancing_policy,
            &base.default_load_balancing_policy,
            &template.default_load_balancing_policy,
        ));
        applied += usize::from(inherit(
            &mut self.enable_keep_alive,
            &base.enable_keep_alive,
            &template.enable_keep_alive,
        ));
        applied += usize::from(inherit(
            &mut self.inherit_defaults,
            &base.inherit_defaults,
            &template.inherit_defaults,
        ));
        applied += usize::from(inherit(
            &mut self.idle_timeout,
            &base.idle_timeout,
            &template.idle_timeout,
        ));
        applied += usize::from(inherit(
            &mut self.keep_alive_time,
            &base.keep_alive_time,
            &template.keep_alive_time,
        ));
        applied += usize::from(inherit(
            &mut self.keep_alive_timeout,
            &base.keep_alive_timeout,
            &template.keep_alive_timeout,
        ));
        applied += usize::from(inherit(
            &mut self.keep_alive_without_calls,
            &base.keep_alive_without_calls,
            &template.keep_alive_without_calls,
        ));
        applied += usize::from(inherit(
            &mut self.max_inbound_message_size,
            &base.max_inbound_message_size,
            &template.max_inbound_message_size,
        ));
        applied += usize::from(inherit(
            &mut self.max_inbound_metadata_size,
            &base.max_inbound_metadata_size,
            &template.max_inbound_metadata_size,
        ));
        applied += usize::from(inherit(
            &mut self.negotiation_type,
            &base.negotiation_type,
            &template.negotiation_type,
        ));
        applied += usize::from(inherit(&mut self.secure, &base.secure, &template.secure));
        applied += usize::from(inherit(
            &mut self.user_agent,
            &base.user_agent,
            &template.user_agent,
        ));
        applied += self.health.overlay_defaults(&template.health);
        applied += self.security.overlay_defaults(&template.security);
        if self.service_config == base.service_config
            && template.service_config != base.service_config
        {
            self.service_config.clear();
            self.service_config.extend(
                template
                    .service_config
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone())),
            );
            applied += 1;
        }
        tracing::trace!(applied, "overlaid endpoint defaults");
        self
    }

    /// Resolves this config against `template` if it opted into inheritance.
    ///
    /// Configs with `inherit_defaults == false` are returned untouched.
    /// Resolving an already resolved config against the same template is a no-op.
    pub fn inherit_from(&mut self, template: &EndpointConfig) -> &mut Self {
        if !self.inherit_defaults {
            return self;
        }
        self.overlay_defaults(template)
    }
}

impl HealthConfig {
    /// Field-level overlay for health settings. Returns the number of fields copied.
    pub fn overlay_defaults(&mut self, template: &HealthConfig) -> usize {
        let base = HealthConfig::default();
        usize::from(inherit(&mut self.enabled, &base.enabled, &template.enabled))
            + usize::from(inherit(
                &mut self.service_name,
                &base.service_name,
                &template.service_name,
            ))
    }
}

impl SecurityConfig {
    /// Field-level overlay for security settings. Returns the number of fields copied.
    pub fn overlay_defaults(&mut self, template: &SecurityConfig) -> usize {
        let base = SecurityConfig::default();
        usize::from(inherit(&mut self.enabled, &base.enabled, &template.enabled))
            + usize::from(inherit(&mut self.bundle, &base.bundle, &template.bundle))
    }
}
