// libs/appointment-cell/src/services/availability.rs
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use crate::models::{
    Appointment, AppointmentAvailability, AppointmentError, AvailabilityQuery, AvailabilitySlot,
};
use crate::services::interval::{chunk, clamp_to_window, free_gaps, merge_intervals, Interval};
use crate::services::repository::{AppointmentRepository, RangeFilter};

/// How busy rows are grouped into reported `(provider, location)` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupingMode {
    /// Every requested provider is reported under exactly this location.
    Filtered(String),
    /// One group per provider per location seen in its busy rows. The
    /// location-less group pools all of the provider's busy time.
    Unfiltered,
}

impl GroupingMode {
    pub fn from_location(location: Option<&str>) -> Self {
        match location {
            Some(location) => GroupingMode::Filtered(location.to_string()),
            None => GroupingMode::Unfiltered,
        }
    }
}

/// Busy intervals collected for one reported group, before clamping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusyGroup {
    pub provider_id: i64,
    pub location: Option<String>,
    pub busy: Vec<Interval>,
}

pub struct AvailabilityPlanner {
    repository: Arc<dyn AppointmentRepository>,
}

impl AvailabilityPlanner {
    pub fn new(repository: Arc<dyn AppointmentRepository>) -> Self {
        Self { repository }
    }

    /// Free slots per `(provider, location)` group inside the query window,
    /// sorted by provider id then location.
    pub async fn compute_availability(
        &self,
        query: &AvailabilityQuery,
    ) -> Result<Vec<AppointmentAvailability>, AppointmentError> {
        validate_query(query)?;

        let provider_ids: Vec<i64> = query
            .provider_ids
            .iter()
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        debug!("Computing availability for providers {:?} between {} and {} ({} min slots)",
               provider_ids, query.start_from, query.end_to, query.slot_minutes);

        let filter = RangeFilter {
            provider_ids: provider_ids.clone(),
            start: query.start_from,
            end: query.end_to,
            location: query.location.clone(),
            exclude_appointment_id: query.exclude_appointment_id,
        };
        let rows = self.repository.find_active_in_range(&filter).await?;

        let mode = GroupingMode::from_location(query.location.as_deref());
        let availability: Vec<AppointmentAvailability> = group_busy(&mode, &provider_ids, &rows)
            .into_iter()
            .map(|group| AppointmentAvailability {
                slots: plan_slots(&group.busy, query.start_from, query.end_to, query.slot_minutes),
                provider_id: group.provider_id,
                location: group.location,
            })
            .collect();

        debug!("Availability computed: {} groups, {} slots",
               availability.len(),
               availability.iter().map(|group| group.slots.len()).sum::<usize>());

        Ok(availability)
    }
}

pub fn validate_query(query: &AvailabilityQuery) -> Result<(), AppointmentError> {
    if query.provider_ids.is_empty() {
        warn!("Availability query without providers rejected");
        return Err(AppointmentError::ValidationError(
            "At least one provider id is required".to_string(),
        ));
    }
    if query.slot_minutes <= 0 {
        return Err(AppointmentError::ValidationError(
            "slot_minutes must be positive".to_string(),
        ));
    }
    if query.start_from >= query.end_to {
        return Err(AppointmentError::ValidationError(
            "start_from must be before end_to".to_string(),
        ));
    }
    let window_minutes = (query.end_to - query.start_from).num_minutes();
    if query.slot_minutes > window_minutes {
        return Err(AppointmentError::ValidationError(format!(
            "slot_minutes {} exceeds the {} minute window",
            query.slot_minutes, window_minutes
        )));
    }
    Ok(())
}

/// Builds the reported groups from busy rows. `provider_ids` must be sorted and unique.
pub fn group_busy(mode: &GroupingMode, provider_ids: &[i64], rows: &[Appointment]) -> Vec<BusyGroup> {
    let mut by_provider: BTreeMap<i64, Vec<&Appointment>> = BTreeMap::new();
    for row in rows.iter().filter(|row| row.is_active()) {
        by_provider.entry(row.provider_id).or_default().push(row);
    }

    let mut groups = Vec::new();
    for &provider_id in provider_ids {
        let provider_rows = by_provider.get(&provider_id).map(Vec::as_slice).unwrap_or(&[]);

        match mode {
            GroupingMode::Filtered(location) => {
                let busy = provider_rows
                    .iter()
                    .filter(|row| row.location.as_deref() == Some(location.as_str()))
                    .map(|row| (row.start_time, row.end_time))
                    .collect();
                groups.push(BusyGroup {
                    provider_id,
                    location: Some(location.clone()),
                    busy,
                });
            }
            GroupingMode::Unfiltered => {
                if provider_rows.is_empty() {
                    groups.push(BusyGroup { provider_id, location: None, busy: Vec::new() });
                    continue;
                }

                let locations: BTreeSet<Option<&str>> =
                    provider_rows.iter().map(|row| row.location.as_deref()).collect();
                for location in locations {
                    let busy = provider_rows
                        .iter()
                        .filter(|row| location.is_none() || row.location.as_deref() == location)
                        .map(|row| (row.start_time, row.end_time))
                        .collect();
                    groups.push(BusyGroup {
                        provider_id,
                        location: location.map(str::to_string),
                        busy,
                    });
                }
            }
        }
    }

    groups.sort_by(|a, b| {
        (a.provider_id, a.location.as_deref().unwrap_or(""))
            .cmp(&(b.provider_id, b.location.as_deref().unwrap_or("")))
    });
    groups
}

/// Clamp, merge, take the gaps and cut them into full-length slots.
pub fn plan_slots(
    busy: &[Interval],
    window_start: NaiveDateTime,
    window_end: NaiveDateTime,
    slot_minutes: i64,
) -> Vec<AvailabilitySlot> {
    let merged = merge_intervals(&clamp_to_window(busy, window_start, window_end));

    free_gaps(&merged, window_start, window_end)
        .into_iter()
        .flat_map(|(gap_start, gap_end)| chunk(gap_start, gap_end, slot_minutes))
        .map(|(start_time, end_time)| AvailabilitySlot { start_time, end_time })
        .collect()
}
