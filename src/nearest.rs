//! The k-nearest-feature search: for one chromosome's query table and one
//! Reference Pair, emits the k closest reference features per query with
//! correct overlap, boundary, and distance-bound semantics.
//!
//! This is the engine's hardest module. Queries must arrive sorted
//! ascending by `start` (the Chromosome Partitioner guarantees this) so the
//! overlap cursor advances monotonically across the whole chromosome.

use crate::reference::{ReferencePair, ReferenceSide};
use crate::types::IntervalTable;

/// One result slot: either a feature at a signed distance, or a padding
/// `N/A` when fewer than k candidates exist within bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    Found {
        feature: String,
        dist: i64,
        gene_id: Option<String>,
        gene_type: Option<String>,
    },
    NotAvailable,
}

/// Parameters controlling one chromosome's search, shared across all of
/// that chromosome's queries.
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub feature_col: String,
    pub up_bound: Option<i64>,
    pub down_bound: Option<i64>,
    pub k: usize,
    pub species_genome: Option<String>,
    pub view_window: f64,
}

impl SearchParams {
    pub fn is_gene_search(&self) -> bool {
        self.feature_col == "gene_name"
    }
}

/// `searchsorted(arr, value, side="right")`: first index where `arr[i] > value`.
fn searchsorted_right(arr: &[i64], value: i64) -> usize {
    arr.partition_point(|&x| x <= value)
}

/// `searchsorted(arr, value, side="left")`: first index where `arr[i] >= value`.
fn searchsorted_left(arr: &[i64], value: i64) -> usize {
    arr.partition_point(|&x| x < value)
}

fn constrain(
    qs: i64,
    qe: i64,
    starts_ref: &ReferenceSide,
    ends_ref: &ReferenceSide,
    up_bound: Option<i64>,
    down_bound: Option<i64>,
) -> (usize, usize, usize) {
    let ds_upper = match down_bound {
        Some(db) => searchsorted_right(&starts_ref.start, qe + db),
        None => starts_ref.len(),
    };
    let us_lower = match up_bound {
        Some(ub) => searchsorted_left(&ends_ref.end, qs - ub),
        None => 0,
    };
    let us_upper = searchsorted_right(&ends_ref.end, qe);
    (ds_upper, us_lower, us_upper)
}

fn overlaps(qs: i64, qe: i64, starts_ref: &ReferenceSide, idx: usize) -> bool {
    let fs = starts_ref.start[idx];
    let fe = starts_ref.end[idx];
    (fs <= qs && fe >= qs) || (fs <= qe && fe >= qe)
}

/// Rebuilds the overlap survivor set for one query in a single pass (never
/// mutating `overlap_features` while iterating it), then advances the
/// monotonic cursor through any newly-reachable start-sorted features.
fn advance_overlaps(
    qs: i64,
    qe: i64,
    starts_ref: &ReferenceSide,
    ds_upper: usize,
    overlap_features: &mut Vec<usize>,
    overlap_index: &mut usize,
) {
    overlap_features.retain(|&idx| overlaps(qs, qe, starts_ref, idx));
    while *overlap_index < ds_upper && starts_ref.start[*overlap_index] <= qe {
        if overlaps(qs, qe, starts_ref, *overlap_index) {
            overlap_features.push(*overlap_index);
        }
        *overlap_index += 1;
    }
}

fn slot_from_starts(starts_ref: &ReferenceSide, idx: usize, dist: i64) -> Slot {
    Slot::Found {
        feature: starts_ref.feature[idx].clone(),
        dist,
        gene_id: starts_ref.gene_id.as_ref().map(|v| v[idx].clone()),
        gene_type: starts_ref.gene_type.as_ref().map(|v| v[idx].clone()),
    }
}

fn slot_from_ends(ends_ref: &ReferenceSide, idx: usize, dist: i64) -> Slot {
    Slot::Found {
        feature: ends_ref.feature[idx].clone(),
        dist,
        gene_id: ends_ref.gene_id.as_ref().map(|v| v[idx].clone()),
        gene_type: ends_ref.gene_type.as_ref().map(|v| v[idx].clone()),
    }
}

/// Runs the nearest-feature search for every query in `roi` (must already be
/// sorted ascending by `start`) against one chromosome's Reference Pair.
pub fn search_chromosome(
    roi: &IntervalTable,
    ref_pair: &ReferencePair,
    params: &SearchParams,
) -> Vec<Vec<Slot>> {
    let k = params.k;
    let mut overlap_features: Vec<usize> = Vec::new();
    let mut overlap_index: usize = 0;
    let mut results = Vec::with_capacity(roi.len());

    for i in 0..roi.len() {
        let qs = roi.start[i];
        let qe = roi.end[i];

        let (ds_upper, us_lower, us_upper) = constrain(
            qs,
            qe,
            &ref_pair.starts,
            &ref_pair.ends,
            params.up_bound,
            params.down_bound,
        );

        advance_overlaps(
            qs,
            qe,
            &ref_pair.starts,
            ds_upper,
            &mut overlap_features,
            &mut overlap_index,
        );

        let mut slots = Vec::with_capacity(k);
        for &idx in &overlap_features {
            if slots.len() == k {
                break;
            }
            slots.push(slot_from_starts(&ref_pair.starts, idx, 0));
        }

        let mut ds_index = overlap_index;
        let mut us_index: i64 = us_upper as i64 - 1;

        while slots.len() < k && us_index >= us_lower as i64 && ds_index < ds_upper {
            let ds_dist = (ref_pair.starts.start[ds_index] - qe).max(0);
            let us_dist = (qs - ref_pair.ends.end[us_index as usize]).max(0);

            if ds_dist == 0 {
                ds_index += 1;
                continue;
            }
            if us_dist == 0 {
                us_index -= 1;
                continue;
            }

            if ds_dist < us_dist {
                slots.push(slot_from_starts(&ref_pair.starts, ds_index, ds_dist));
                ds_index += 1;
            } else {
                slots.push(slot_from_ends(&ref_pair.ends, us_index as usize, -us_dist));
                us_index -= 1;
            }
        }

        if slots.len() < k && us_index < us_lower as i64 {
            while slots.len() < k && ds_index < ds_upper {
                let ds_dist = (ref_pair.starts.start[ds_index] - qe).max(0);
                slots.push(slot_from_starts(&ref_pair.starts, ds_index, ds_dist));
                ds_index += 1;
            }
        } else if slots.len() < k && ds_index >= ds_upper {
            while slots.len() < k && us_index >= us_lower as i64 {
                let us_dist = (qs - ref_pair.ends.end[us_index as usize]).max(0);
                slots.push(slot_from_ends(&ref_pair.ends, us_index as usize, -us_dist));
                us_index -= 1;
            }
        }

        while slots.len() < k {
            slots.push(Slot::NotAvailable);
        }

        results.push(slots);
    }

    results
}

/// Derives the UCSC Genome Browser URL for one query interval, expanding the
/// viewport so the query occupies `view_window` of the window.
pub fn ucsc_browser_url(species_genome: &str, chr: &str, qs: i64, qe: i64, view_window: f64) -> String {
    let peak_len = (qe - qs) as f64;
    let half_span = peak_len / ((1.0 - view_window) / 2.0);
    let window_start = ((qs as f64 - half_span).floor() as i64).max(1);
    let window_end = (qe as f64 + half_span).floor() as i64;
    format!(
        "https://genome.ucsc.edu/cgi-bin/hgTracks?db={species_genome}&position={chr}:{window_start}-{window_end}&highlight={chr}:{qs}-{qe}"
    )
}
