//! Tab / sub-view state derived from the URL.
//!
//! The active tab is never stored anywhere but the `tab` query parameter;
//! [`TabMachine`] only interprets it and turns tab clicks into intents.

use rtrack_core::{TabRef, ViewState, PARAM_TAB};
use rtrack_query::Location;

use crate::route::{PageKind, Route};
use crate::{NavError, NavigationIntent, SetTabCommand};

const COUNTRY_TABS: &[&str] =
    &["snapshot", "report-esr", "report-physint", "report-empowerment", "atrisk", "about"];
const METRIC_TABS: &[&str] = &["report", "atrisk", "about"];
const GROUP_TABS: &[&str] = &["report", "about"];
const LIST_TABS: &[&str] = &["overview", "about"];

/// Ordered tab keys for a page template.
pub fn tabs_for(kind: PageKind) -> &'static [&'static str] {
    match kind {
        PageKind::Country => COUNTRY_TABS,
        PageKind::Metric => METRIC_TABS,
        PageKind::Group => GROUP_TABS,
        PageKind::Countries | PageKind::Metrics | PageKind::Groups => LIST_TABS,
        PageKind::Home | PageKind::Page | PageKind::Other => &[],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabMachine {
    kind: PageKind,
}

impl TabMachine {
    pub fn new(kind: PageKind) -> Self { Self { kind } }

    pub fn for_location(location: &Location) -> Self { Self::new(Route::from_path(&location.path).page.kind()) }

    pub fn kind(&self) -> PageKind { self.kind }

    pub fn tabs(&self) -> &'static [&'static str] { tabs_for(self.kind) }

    /// Active index: a valid index, a known key, else the first tab.
    pub fn active_index(&self, view: &ViewState) -> usize {
        let tabs = self.tabs();
        match &view.tab {
            Some(TabRef::Index(i)) if *i < tabs.len() => *i,
            Some(TabRef::Key(k)) => tabs.iter().position(|t| t == k).unwrap_or(0),
            _ => 0,
        }
    }

    pub fn active_key(&self, view: &ViewState) -> Option<&'static str> { self.tabs().get(self.active_index(view)).copied() }

    /// Turn a tab click into an intent that stays on the current page.
    pub fn command(&self, cmd: SetTabCommand, current: &Location) -> Result<NavigationIntent, NavError> {
        let count = self.tabs().len();
        if cmd.index >= count {
            return Err(NavError::TabOutOfRange { page: self.kind.as_str(), index: cmd.index, count });
        }
        Ok(NavigationIntent::to(format!("{}?{}={}", current.path, PARAM_TAB, cmd.index)).keep_tab(true))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtrack_query::decode;

    #[test]
    fn active_index_from_url() {
        let m = TabMachine::new(PageKind::Country);
        assert_eq!(m.active_index(&decode("tab=2")), 2);
        assert_eq!(m.active_index(&decode("tab=atrisk")), 4);
        assert_eq!(m.active_index(&decode("tab=99")), 0);
        assert_eq!(m.active_index(&decode("tab=nope")), 0);
        assert_eq!(m.active_key(&decode("")), Some("snapshot"));
    }

    #[test]
    fn command_rejects_out_of_range() {
        let loc = Location::parse("/metric/food");
        let m = TabMachine::for_location(&loc);
        assert_eq!(m.kind(), PageKind::Metric);
        let i = m.command(SetTabCommand { index: 1 }, &loc).unwrap();
        assert_eq!(i.target, "/metric/food?tab=1");
        assert!(i.keep_tab);
        assert!(matches!(
            m.command(SetTabCommand { index: 3 }, &loc),
            Err(NavError::TabOutOfRange { index: 3, count: 3, .. })
        ));
    }

    #[test]
    fn home_has_no_tabs() {
        let m = TabMachine::new(PageKind::Home);
        assert!(m.tabs().is_empty());
        assert_eq!(m.active_key(&decode("tab=1")), None);
    }
}
