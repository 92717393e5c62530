/// Device registry - stable row assignment for trackers
///
/// Row order is declaration order. The registry is built once at startup
/// and never changes, so a device's data always lands in the same frame row.
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRegistry {
    ids: Vec<String>,
    rows: HashMap<String, usize>,
}

impl DeviceRegistry {
    /// Assign rows `0..N` to the given identifiers in order.
    ///
    /// Identifiers are expected to be unique and non-empty; configuration
    /// validation enforces that before the registry is built. A repeated
    /// identifier keeps its first row.
    pub fn assign<I, S>(ordered_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids = Vec::new();
        let mut rows = HashMap::new();

        for id in ordered_ids {
            let id = id.into();
            if rows.contains_key(&id) {
                continue;
            }
            rows.insert(id.clone(), ids.len());
            ids.push(id);
        }

        Self { ids, rows }
    }

    /// Row index for a device, or `None` if it was never configured.
    #[inline]
    pub fn row_of(&self, device_id: &str) -> Option<usize> {
        self.rows.get(device_id).copied()
    }

    /// Device identifier stored at `row`.
    pub fn id_at(&self, row: usize) -> Option<&str> {
        self.ids.get(row).map(String::as_str)
    }

    /// Identifiers in row order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
