// crates/issue-workflow-core/src/runtime/catalog.rs
// ============================================================================
// Module: In-Memory Catalog
// Description: Rules, users, action plans, and components held in memory.
// Purpose: Stand in for collaborator lookups in tests and embedded hosts.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! [`InMemoryCatalog`] implements every catalog lookup trait. Clones share
//! the same registrations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

use crate::core::ActionPlan;
use crate::core::ActionPlanKey;
use crate::core::Component;
use crate::core::ComponentKey;
use crate::core::ComponentUuid;
use crate::core::Login;
use crate::core::ProjectUuid;
use crate::core::Rule;
use crate::core::RuleKey;
use crate::core::User;
use crate::interfaces::ActionPlanLookup;
use crate::interfaces::CatalogError;
use crate::interfaces::ComponentLookup;
use crate::interfaces::RuleLookup;
use crate::interfaces::UserLookup;

// ============================================================================
// SECTION: In-Memory Catalog
// ============================================================================

/// Registered catalog entities.
#[derive(Debug, Default)]
struct CatalogState {
    /// Rules by key.
    rules: BTreeMap<RuleKey, Rule>,
    /// Users by login.
    users: BTreeMap<Login, User>,
    /// Action plans by key.
    action_plans: BTreeMap<ActionPlanKey, ActionPlan>,
    /// Components by key.
    components: BTreeMap<ComponentKey, Component>,
    /// Component keys by UUID.
    component_uuids: BTreeMap<ComponentUuid, ComponentKey>,
}

/// In-memory catalog.
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalog {
    /// Shared registrations.
    state: Arc<RwLock<CatalogState>>,
}

impl InMemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a rule.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the catalog lock is poisoned.
    pub fn add_rule(&self, rule: Rule) -> Result<(), CatalogError> {
        self.write()?.rules.insert(rule.key.clone(), rule);
        Ok(())
    }

    /// Registers or replaces a user.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the catalog lock is poisoned.
    pub fn add_user(&self, user: User) -> Result<(), CatalogError> {
        self.write()?.users.insert(user.login.clone(), user);
        Ok(())
    }

    /// Registers or replaces an action plan.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the catalog lock is poisoned.
    pub fn add_action_plan(&self, plan: ActionPlan) -> Result<(), CatalogError> {
        self.write()?.action_plans.insert(plan.key.clone(), plan);
        Ok(())
    }

    /// Registers or replaces a component.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] when the catalog lock is poisoned.
    pub fn add_component(&self, component: Component) -> Result<(), CatalogError> {
        let mut guard = self.write()?;
        guard.component_uuids.insert(component.uuid.clone(), component.key.clone());
        guard.components.insert(component.key.clone(), component);
        Ok(())
    }

    /// Acquires the read lock.
    fn read(&self) -> Result<RwLockReadGuard<'_, CatalogState>, CatalogError> {
        self.state
            .read()
            .map_err(|_| CatalogError::Unavailable("catalog lock poisoned".to_string()))
    }

    /// Acquires the write lock.
    fn write(&self) -> Result<RwLockWriteGuard<'_, CatalogState>, CatalogError> {
        self.state
            .write()
            .map_err(|_| CatalogError::Unavailable("catalog lock poisoned".to_string()))
    }
}

impl RuleLookup for InMemoryCatalog {
    fn get_rule(&self, key: &RuleKey) -> Result<Option<Rule>, CatalogError> {
        Ok(self.read()?.rules.get(key).cloned())
    }
}

impl UserLookup for InMemoryCatalog {
    fn get_user_by_login(&self, login: &Login) -> Result<Option<User>, CatalogError> {
        Ok(self.read()?.users.get(login).cloned())
    }
}

impl ActionPlanLookup for InMemoryCatalog {
    fn get_action_plan(&self, key: &ActionPlanKey) -> Result<Option<ActionPlan>, CatalogError> {
        Ok(self.read()?.action_plans.get(key).cloned())
    }
}

impl ComponentLookup for InMemoryCatalog {
    fn get_component(&self, key: &ComponentKey) -> Result<Option<Component>, CatalogError> {
        Ok(self.read()?.components.get(key).cloned())
    }

    fn get_project(&self, uuid: &ProjectUuid) -> Result<Option<Component>, CatalogError> {
        let guard = self.read()?;
        let project = guard
            .component_uuids
            .get(&ComponentUuid::new(uuid.as_str()))
            .and_then(|key| guard.components.get(key))
            .filter(|component| component.is_project())
            .cloned();
        Ok(project)
    }
}
