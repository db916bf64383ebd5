use std::sync::Arc;

use rtrack_core::PARAM_TAB;
use rtrack_query::{decode, encode, overlay, present_keys, Location};
use tracing::{debug, info, warn};

use crate::analytics::{Analytics, History};
use crate::route::{is_app_locale, Route};
use crate::tabs::TabMachine;
use crate::{NavError, NavigationIntent, SetLocaleCommand, SetRawCommand, SetTabCommand};

/// Compute the location an intent leads to. No side effects.
pub fn resolve(intent: &NavigationIntent, current: &Location) -> Location {
    let current_state = decode(&current.query);
    let current_route = Route::from_path(&current.path);
    let target = Location::parse(&intent.target);
    let mut target_route = Route::from_path(&target.path);
    if target_route.locale.is_none() {
        target_route.locale = current_route.locale.clone();
    }
    let same_page = target_route.page.kind() == current_route.page.kind();

    let mut delete = intent.delete_params.clone();
    let mut next = current_state.clone();
    if !intent.keep_tab || !same_page {
        next.tab = None;
        delete.insert(PARAM_TAB.to_string());
    }
    for k in delete.iter() {
        next.filters.remove(k);
        next.extra.remove(k);
    }
    // explicit target params win over deletion
    let explicit = present_keys(&target.query);
    delete.retain(|k| !explicit.contains(k));
    let next = overlay(next, &target.query);

    let query = encode(&next, &current_state, &delete);
    debug!(same_page, keep_tab = intent.keep_tab, deleted = delete.len(), "nav: resolved");
    Location::new(&target_route.path(), &query)
}

/// Single entry point for URL changes.
#[derive(Clone)]
pub struct Navigator {
    analytics: Arc<dyn Analytics>,
    history: Arc<dyn History>,
}

impl Navigator {
    pub fn new(analytics: Arc<dyn Analytics>, history: Arc<dyn History>) -> Self { Self { analytics, history } }

    pub fn navigate(&self, intent: NavigationIntent, current: &Location) -> Location {
        let next = resolve(&intent, current);
        info!(from = %current, to = %next, "nav: navigate");
        metrics::counter!("navigations_total", 1u64);
        self.history.push(&next);
        if let Some(event) = intent.track_event.as_ref() {
            if let Err(e) = self.analytics.track(event) {
                warn!(error = %e, category = %event.category, action = %event.action, "nav: analytics failed");
                metrics::counter!("analytics_failures_total", 1u64);
            }
        }
        next
    }

    pub fn set_tab(&self, cmd: SetTabCommand, current: &Location) -> Result<Location, NavError> {
        let intent = TabMachine::for_location(current).command(cmd, current)?;
        Ok(self.navigate(intent, current))
    }

    pub fn set_raw(&self, cmd: SetRawCommand, current: &Location) -> Location { self.navigate(cmd.intent(current), current) }

    /// Rewrite the locale prefix; page and query are untouched.
    pub fn set_locale(&self, cmd: SetLocaleCommand, current: &Location) -> Result<Location, NavError> {
        if !is_app_locale(&cmd.locale) {
            return Err(NavError::UnknownLocale(cmd.locale));
        }
        let mut route = Route::from_path(&current.path);
        route.locale = Some(cmd.locale);
        let next = Location::new(&route.path(), &current.query);
        info!(from = %current, to = %next, "nav: set locale");
        self.history.push(&next);
        Ok(next)
    }
}
