//! Mapping a client's criteria onto the engine's provider set.

use std::sync::Arc;

use pinpoint_types::Criteria;

use crate::provider::Provider;
use crate::state_tracking::StateTrackingProvider;

/// Enumerates the providers known to an engine, in insertion order.
pub trait ProviderEnumerator {
    fn for_each_provider(&self, enumerator: &mut dyn FnMut(&Arc<StateTrackingProvider>));
}

/// The providers chosen to serve one criteria: one per requested feature.
/// A passive record; streams are not started by selecting.
#[derive(Clone, Default)]
pub struct ProviderSelection {
    pub position: Option<Arc<StateTrackingProvider>>,
    pub heading: Option<Arc<StateTrackingProvider>>,
    pub velocity: Option<Arc<StateTrackingProvider>>,
}

impl ProviderSelection {
    pub fn is_empty(&self) -> bool {
        self.position.is_none() && self.heading.is_none() && self.velocity.is_none()
    }

    /// The distinct providers in the selection, position slot first.
    pub fn distinct_providers(&self) -> Vec<Arc<StateTrackingProvider>> {
        let mut providers: Vec<Arc<StateTrackingProvider>> = Vec::new();
        for candidate in [&self.position, &self.heading, &self.velocity]
            .into_iter()
            .flatten()
        {
            if !providers.iter().any(|p| p.id() == candidate.id()) {
                providers.push(candidate.clone());
            }
        }
        providers
    }
}

/// Maps a criteria to a subset of the currently registered providers.
pub trait ProviderSelectionPolicy: Send + Sync {
    fn determine_provider_selection_for_criteria(
        &self,
        criteria: &Criteria,
        providers: &dyn ProviderEnumerator,
    ) -> ProviderSelection;
}

/// Picks, per requested feature, the first satisfying provider in
/// enumeration order. Deterministic because the engine preserves insertion
/// order.
#[derive(Debug, Default)]
pub struct DefaultProviderSelectionPolicy;

impl ProviderSelectionPolicy for DefaultProviderSelectionPolicy {
    fn determine_provider_selection_for_criteria(
        &self,
        criteria: &Criteria,
        providers: &dyn ProviderEnumerator,
    ) -> ProviderSelection {
        let mut first_satisfying: Option<Arc<StateTrackingProvider>> = None;
        providers.for_each_provider(&mut |provider| {
            if first_satisfying.is_none() && provider.satisfies(criteria) {
                first_satisfying = Some(provider.clone());
            }
        });

        let chosen = match first_satisfying {
            Some(provider) => provider,
            None => return ProviderSelection::default(),
        };

        ProviderSelection {
            position: criteria.wants_position().then(|| chosen.clone()),
            heading: criteria.wants_heading().then(|| chosen.clone()),
            velocity: criteria.wants_velocity().then(|| chosen.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Provider;
    use crate::test_support::MockProvider;
    use pinpoint_types::Features;

    struct FixedSet(Vec<Arc<StateTrackingProvider>>);

    impl ProviderEnumerator for FixedSet {
        fn for_each_provider(&self, enumerator: &mut dyn FnMut(&Arc<StateTrackingProvider>)) {
            for provider in &self.0 {
                enumerator(provider);
            }
        }
    }

    fn wrap(satisfies: bool) -> Arc<StateTrackingProvider> {
        crate::state_tracking::StateTrackingProvider::new(Arc::new(MockProvider {
            satisfies,
            ..MockProvider::new()
        }))
    }

    #[test]
    fn selection_is_empty_when_nothing_satisfies() {
        let set = FixedSet(vec![wrap(false), wrap(false)]);
        let selection = DefaultProviderSelectionPolicy
            .determine_provider_selection_for_criteria(&Criteria::default(), &set);
        assert!(selection.is_empty());
    }

    #[test]
    fn the_first_satisfying_provider_wins_in_enumeration_order() {
        let reject = wrap(false);
        let first = wrap(true);
        let second = wrap(true);
        let set = FixedSet(vec![reject, first.clone(), second]);

        let criteria = Criteria {
            requires: Features::POSITION | Features::VELOCITY,
            ..Criteria::default()
        };
        let selection =
            DefaultProviderSelectionPolicy.determine_provider_selection_for_criteria(&criteria, &set);

        assert_eq!(selection.position.as_ref().unwrap().id(), first.id());
        assert_eq!(selection.velocity.as_ref().unwrap().id(), first.id());
        // Heading was not requested.
        assert!(selection.heading.is_none());
    }

    #[test]
    fn distinct_providers_deduplicates_the_slots() {
        let provider = wrap(true);
        let selection = ProviderSelection {
            position: Some(provider.clone()),
            heading: Some(provider.clone()),
            velocity: Some(provider),
        };
        assert_eq!(selection.distinct_providers().len(), 1);
    }

    #[test]
    fn satisfies_consults_the_wrapped_provider() {
        let provider = wrap(true);
        assert!(provider.satisfies(&Criteria::default()));
    }
}
