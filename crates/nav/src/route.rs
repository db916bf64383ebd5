use serde::{Deserialize, Serialize};

pub const APP_LOCALES: &[&str] = &["en", "es", "fr", "pt", "zh"];
pub const DEFAULT_LOCALE: &str = "en";

// Path segments (stable)
pub const PATH_METRICS: &str = "metrics";
pub const PATH_METRIC: &str = "metric";
pub const PATH_COUNTRIES: &str = "countries";
pub const PATH_COUNTRY: &str = "country";
pub const PATH_GROUPS: &str = "groups";
pub const PATH_GROUP: &str = "group";
pub const PATH_PAGE: &str = "page";

pub fn is_app_locale(code: &str) -> bool { APP_LOCALES.contains(&code) }

/// Page template, independent of the entity it shows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum PageKind {
    Home,
    Metrics,
    Metric,
    Countries,
    Country,
    Groups,
    Group,
    Page,
    Other,
}

impl PageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PageKind::Home => "home",
            PageKind::Metrics => "metrics",
            PageKind::Metric => "metric",
            PageKind::Countries => "countries",
            PageKind::Country => "country",
            PageKind::Groups => "groups",
            PageKind::Group => "group",
            PageKind::Page => "page",
            PageKind::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Page {
    Home,
    Metrics,
    Metric(String),
    Countries,
    Country(String),
    Groups,
    Group(String),
    Page(String),
    Other(Vec<String>),
}

impl Page {
    pub fn kind(&self) -> PageKind {
        match self {
            Page::Home => PageKind::Home,
            Page::Metrics => PageKind::Metrics,
            Page::Metric(_) => PageKind::Metric,
            Page::Countries => PageKind::Countries,
            Page::Country(_) => PageKind::Country,
            Page::Groups => PageKind::Groups,
            Page::Group(_) => PageKind::Group,
            Page::Page(_) => PageKind::Page,
            Page::Other(_) => PageKind::Other,
        }
    }

    fn from_segments(segs: &[&str]) -> Self {
        match segs {
            [] => Page::Home,
            [PATH_METRICS] => Page::Metrics,
            [PATH_METRIC, code] => Page::Metric((*code).to_string()),
            [PATH_COUNTRIES] => Page::Countries,
            [PATH_COUNTRY, code] => Page::Country(code.to_ascii_uppercase()),
            [PATH_GROUPS] => Page::Groups,
            [PATH_GROUP, code] => Page::Group((*code).to_string()),
            [PATH_PAGE, key] => Page::Page((*key).to_string()),
            other => Page::Other(other.iter().map(|s| s.to_string()).collect()),
        }
    }

    fn segments(&self) -> Vec<String> {
        match self {
            Page::Home => Vec::new(),
            Page::Metrics => vec![PATH_METRICS.into()],
            Page::Metric(c) => vec![PATH_METRIC.into(), c.clone()],
            Page::Countries => vec![PATH_COUNTRIES.into()],
            Page::Country(c) => vec![PATH_COUNTRY.into(), c.clone()],
            Page::Groups => vec![PATH_GROUPS.into()],
            Page::Group(c) => vec![PATH_GROUP.into(), c.clone()],
            Page::Page(k) => vec![PATH_PAGE.into(), k.clone()],
            Page::Other(segs) => segs.clone(),
        }
    }
}

/// A resolved path: optional locale prefix plus the page it addresses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Route {
    pub locale: Option<String>,
    pub page: Page,
}

impl Route {
    pub fn from_path(path: &str) -> Self {
        let segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        match segs.split_first() {
            Some((first, rest)) if is_app_locale(first) => {
                Route { locale: Some((*first).to_string()), page: Page::from_segments(rest) }
            }
            _ => Route { locale: None, page: Page::from_segments(&segs) },
        }
    }

    pub fn locale_or_default(&self) -> &str { self.locale.as_deref().unwrap_or(DEFAULT_LOCALE) }

    pub fn path(&self) -> String {
        let mut segs: Vec<String> = Vec::new();
        if let Some(l) = &self.locale {
            if l != DEFAULT_LOCALE { segs.push(l.clone()); }
        }
        segs.extend(self.page.segments());
        format!("/{}", segs.join("/"))
    }
}
