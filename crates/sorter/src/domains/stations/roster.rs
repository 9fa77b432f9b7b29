use crate::{Poc, SiteInfo, StationKey};

/// A station that qualified for every requested parameter.
///
/// `pocs[k]` lists the qualifying instruments for the k-th requested
/// parameter, in metadata-table order. Every list is non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterEntry {
    station: StationKey,
    site: SiteInfo,
    pocs: Vec<Vec<Poc>>,
}

impl RosterEntry {
    pub fn new(station: StationKey, site: SiteInfo, pocs: Vec<Vec<Poc>>) -> Self {
        RosterEntry {
            station,
            site,
            pocs,
        }
    }

    pub fn station(&self) -> &StationKey {
        &self.station
    }

    pub fn site(&self) -> &SiteInfo {
        &self.site
    }

    pub fn pocs(&self) -> &[Vec<Poc>] {
        &self.pocs
    }

    pub(crate) fn push_primary_poc(&mut self, poc: Poc) {
        if let Some(primary) = self.pocs.first_mut() {
            primary.push(poc);
        }
    }

    /// Rows emitted per primary instrument: the largest instrument count of
    /// the non-primary parameters, at least one.
    pub fn rows_per_block(&self) -> usize {
        self.pocs
            .iter()
            .skip(1)
            .map(Vec::len)
            .max()
            .unwrap_or(1)
            .max(1)
    }

    /// Sparse table rows for this station.
    ///
    /// Each primary POC opens a block of [`Self::rows_per_block`] rows. Row 0
    /// of a block carries the primary POC, the first instrument of every other
    /// parameter and the site details; row `i > 0` carries only the station
    /// key and the i-th instrument of each parameter that has one.
    pub fn rows(&self) -> Vec<RosterRow> {
        let block = self.rows_per_block();
        let primary = self.pocs.first().map(Vec::as_slice).unwrap_or_default();

        let mut rows = Vec::with_capacity(primary.len() * block);
        for primary_poc in primary {
            for i in 0..block {
                let mut pocs = Vec::with_capacity(self.pocs.len());
                pocs.push((i == 0).then_some(*primary_poc));
                pocs.extend(self.pocs.iter().skip(1).map(|p| p.get(i).copied()));
                rows.push(RosterRow {
                    station: self.station.clone(),
                    pocs,
                    site: (i == 0).then(|| self.site.clone()),
                });
            }
        }
        rows
    }
}

/// One line of the serialised roster table.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterRow {
    pub station: StationKey,
    /// One cell per requested parameter, `None` renders empty.
    pub pocs: Vec<Option<Poc>>,
    /// Present on the first row of a block only.
    pub site: Option<SiteInfo>,
}

/// Stations common to all requested parameters, with their instruments.
#[derive(Debug, Clone, PartialEq)]
pub struct StationRoster {
    parameter_count: usize,
    entries: Vec<RosterEntry>,
}

impl StationRoster {
    pub fn new(parameter_count: usize, entries: Vec<RosterEntry>) -> Self {
        StationRoster {
            parameter_count,
            entries,
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    pub fn entries(&self) -> &[RosterEntry] {
        &self.entries
    }

    pub fn station_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, station: &StationKey) -> bool {
        self.entries.iter().any(|entry| &entry.station == station)
    }

    pub fn rows(&self) -> Vec<RosterRow> {
        self.entries.iter().flat_map(RosterEntry::rows).collect()
    }
}
