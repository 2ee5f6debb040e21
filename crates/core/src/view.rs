use serde::Serialize;

use crate::model::{Alert, Connectivity, SubjectKey};

/// Read-only projection of the console state handed to the render layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConsoleView {
    pub label: Option<String>,
    pub seq: Option<u64>,
    pub connectivity: Connectivity,
    pub tabs: Vec<TabView>,
    pub active_tab: Option<usize>,
    /// Alerts not dismissed locally.
    pub alerts: Vec<Alert>,
    pub alert_badge: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TabView {
    pub key: SubjectKey,
    pub name: String,
    pub case_count: Option<usize>,
    /// Detail has arrived; until then views show a loading placeholder.
    pub loaded: bool,
}

impl ConsoleView {
    pub fn active(&self) -> Option<&TabView> {
        self.active_tab.and_then(|index| self.tabs.get(index))
    }
}
