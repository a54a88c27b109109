//! In-memory policy enforcement backed by an optional adapter.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{default_groupings, default_rules, Grouping, PolicyAdapter, Rule, SUPERUSER};
use crate::Result;

#[derive(Debug, Default)]
struct PolicyState {
    rules: HashSet<Rule>,
    /// member -> direct parents
    groups: HashMap<String, HashSet<String>>,
}

impl PolicyState {
    fn insert_grouping(&mut self, grouping: Grouping) {
        self.groups
            .entry(grouping.member)
            .or_default()
            .insert(grouping.parent);
    }

    /// `subject` followed by every role it inherits from.
    fn lineage(&self, subject: &str) -> Vec<String> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut stack = vec![subject.to_string()];
        let mut order = Vec::new();

        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(parents) = self.groups.get(&current) {
                stack.extend(parents.iter().cloned());
            }
            order.push(current);
        }
        order
    }

    fn allows(&self, subject: &str, object: &str, action: &str) -> bool {
        let lineage = self.lineage(subject);
        if lineage.iter().any(|s| s == SUPERUSER) {
            return true;
        }
        lineage.into_iter().any(|s| {
            self.rules.contains(&Rule {
                subject: s,
                object: object.to_string(),
                action: action.to_string(),
            })
        })
    }
}

/// Permission checks over `(subject, object, action)` tuples.
///
/// The engine keeps every tuple in memory. When an adapter is attached,
/// writes go to the adapter first and only reach the cache once stored.
pub struct PolicyEngine {
    state: RwLock<PolicyState>,
    adapter: Option<Arc<dyn PolicyAdapter>>,
}

impl PolicyEngine {
    /// Engine without persistence, seeded with the default tuples.
    pub fn in_memory() -> Self {
        let mut state = PolicyState::default();
        state.rules.extend(default_rules());
        for grouping in default_groupings() {
            state.insert_grouping(grouping);
        }
        Self {
            state: RwLock::new(state),
            adapter: None,
        }
    }

    /// Load every tuple from `adapter`, storing the defaults first if missing.
    pub async fn load(adapter: Arc<dyn PolicyAdapter>) -> Result<Self> {
        for rule in default_rules() {
            adapter.add_rule(&rule).await?;
        }
        for grouping in default_groupings() {
            adapter.add_grouping(&grouping).await?;
        }

        let snapshot = adapter.load().await?;
        let mut state = PolicyState::default();
        state.rules.extend(snapshot.rules);
        for grouping in snapshot.groupings {
            state.insert_grouping(grouping);
        }
        info!(
            "Loaded {} policy rules and {} role groups",
            state.rules.len(),
            state.groups.len()
        );

        Ok(Self {
            state: RwLock::new(state),
            adapter: Some(adapter),
        })
    }

    /// Check whether `subject` may perform `action` on `object`.
    ///
    /// The superuser role passes every check, directly or through a group.
    pub async fn enforce(&self, subject: &str, object: &str, action: &str) -> bool {
        let allowed = self.state.read().await.allows(subject, object, action);
        debug!(subject, object, action, allowed, "policy check");
        allowed
    }

    /// Store a tuple. Returns whether it was new.
    pub async fn add(&self, subject: &str, object: &str, action: &str) -> Result<bool> {
        let rule = Rule::new(subject, object, action);
        if let Some(adapter) = &self.adapter {
            adapter.add_rule(&rule).await?;
        }
        Ok(self.state.write().await.rules.insert(rule))
    }

    /// Grant `owner` PATCH and DELETE on `object`.
    ///
    /// When either tuple cannot be stored, whatever was stored for `object`
    /// is removed again before the error is returned.
    pub async fn grant_owner(&self, owner: &str, object: &str) -> Result<()> {
        for action in ["PATCH", "DELETE"] {
            if let Err(e) = self.add(owner, object, action).await {
                if let Err(cleanup) = self.remove_all_for_object(object, None).await {
                    warn!(object, "Partial owner grant left behind: {}", cleanup);
                }
                return Err(e);
            }
        }
        Ok(())
    }

    /// Remove a tuple. Returns whether it existed.
    pub async fn remove(&self, subject: &str, object: &str, action: &str) -> Result<bool> {
        let rule = Rule::new(subject, object, action);
        if let Some(adapter) = &self.adapter {
            adapter.remove_rule(&rule).await?;
        }
        Ok(self.state.write().await.rules.remove(&rule))
    }

    /// Remove every tuple on `object`, or only those for `action`.
    pub async fn remove_all_for_object(&self, object: &str, action: Option<&str>) -> Result<usize> {
        if let Some(adapter) = &self.adapter {
            adapter.remove_object(object, action).await?;
        }
        let mut state = self.state.write().await;
        let before = state.rules.len();
        state
            .rules
            .retain(|r| !(r.object == object && action.map_or(true, |a| r.action == a)));
        Ok(before - state.rules.len())
    }

    /// Let `member` inherit every tuple of `parent`.
    pub async fn add_group(&self, member: &str, parent: &str) -> Result<bool> {
        let grouping = Grouping::new(member, parent);
        if let Some(adapter) = &self.adapter {
            adapter.add_grouping(&grouping).await?;
        }
        let mut state = self.state.write().await;
        let new = !state
            .groups
            .get(member)
            .is_some_and(|parents| parents.contains(parent));
        state.insert_grouping(grouping);
        Ok(new)
    }

    /// Remove every tuple and grouping that names `subject`.
    pub async fn remove_subject(&self, subject: &str) -> Result<()> {
        if let Some(adapter) = &self.adapter {
            adapter.remove_subject(subject).await?;
        }
        let mut state = self.state.write().await;
        state.rules.retain(|r| r.subject != subject);
        state.groups.remove(subject);
        for parents in state.groups.values_mut() {
            parents.remove(subject);
        }
        Ok(())
    }

    /// Every tuple on `object`, sorted.
    pub async fn rules_for_object(&self, object: &str) -> Vec<Rule> {
        let state = self.state.read().await;
        let mut rules: Vec<Rule> = state
            .rules
            .iter()
            .filter(|r| r.object == object)
            .cloned()
            .collect();
        rules.sort();
        rules
    }
}

impl std::fmt::Debug for PolicyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyEngine")
            .field("persistent", &self.adapter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{FREE_TIER, PAID_TIER, POST_EXTENDED};

    #[tokio::test]
    async fn test_default_tiers() {
        let engine = PolicyEngine::in_memory();
        assert!(engine.enforce(FREE_TIER, "demos", "POST").await);
        assert!(!engine.enforce(FREE_TIER, "demos", POST_EXTENDED).await);
        // paidtier inherits freetier
        assert!(engine.enforce(PAID_TIER, "demos", "POST").await);
        assert!(engine.enforce(PAID_TIER, "demos", POST_EXTENDED).await);
        assert!(!engine.enforce("nobody", "demos", "POST").await);
    }

    #[tokio::test]
    async fn test_superuser_passes_everything() {
        let engine = PolicyEngine::in_memory();
        assert!(engine.enforce("admin", "demos/42", "DELETE").await);
        assert!(engine.enforce("admin", "anything", "ANY").await);
    }

    #[tokio::test]
    async fn test_add_and_remove() {
        let engine = PolicyEngine::in_memory();
        assert!(engine.add("u1", "demos/7", "PATCH").await.unwrap());
        assert!(!engine.add("u1", "demos/7", "PATCH").await.unwrap());
        assert!(engine.enforce("u1", "demos/7", "PATCH").await);
        assert!(!engine.enforce("u1", "demos/8", "PATCH").await);

        assert!(engine.remove("u1", "demos/7", "PATCH").await.unwrap());
        assert!(!engine.remove("u1", "demos/7", "PATCH").await.unwrap());
        assert!(!engine.enforce("u1", "demos/7", "PATCH").await);
    }

    #[tokio::test]
    async fn test_grant_owner() {
        let engine = PolicyEngine::in_memory();
        engine.grant_owner("u1", "threads/3").await.unwrap();
        assert_eq!(
            engine.rules_for_object("threads/3").await,
            vec![
                Rule::new("u1", "threads/3", "DELETE"),
                Rule::new("u1", "threads/3", "PATCH"),
            ]
        );
    }

    #[tokio::test]
    async fn test_remove_all_for_object() {
        let engine = PolicyEngine::in_memory();
        engine.add("u1", "demos/7", "PATCH").await.unwrap();
        engine.add("u1", "demos/7", "DELETE").await.unwrap();
        engine.add("u2", "demos/8", "DELETE").await.unwrap();

        assert_eq!(
            engine
                .remove_all_for_object("demos/7", Some("PATCH"))
                .await
                .unwrap(),
            1
        );
        assert!(engine.enforce("u1", "demos/7", "DELETE").await);

        assert_eq!(engine.remove_all_for_object("demos/7", None).await.unwrap(), 1);
        assert!(engine.rules_for_object("demos/7").await.is_empty());
        assert!(engine.enforce("u2", "demos/8", "DELETE").await);
    }

    #[tokio::test]
    async fn test_transitive_groups() {
        let engine = PolicyEngine::in_memory();
        engine.add_group("patron", PAID_TIER).await.unwrap();
        assert!(engine.enforce("patron", "threads", "POST").await);
        assert!(engine.enforce("patron", "demos", POST_EXTENDED).await);
    }

    #[tokio::test]
    async fn test_group_cycle_terminates() {
        let engine = PolicyEngine::in_memory();
        engine.add_group("a", "b").await.unwrap();
        engine.add_group("b", "a").await.unwrap();
        assert!(!engine.enforce("a", "demos", "POST").await);
    }

    #[tokio::test]
    async fn test_remove_subject() {
        let engine = PolicyEngine::in_memory();
        engine.add_group("patron", PAID_TIER).await.unwrap();
        engine.add("patron", "assets/1", "DELETE").await.unwrap();
        engine.remove_subject("patron").await.unwrap();
        assert!(!engine.enforce("patron", "demos", "POST").await);
        assert!(!engine.enforce("patron", "assets/1", "DELETE").await);
    }
}
