//! Ranking aggregated results and rendering the report.
//!
//! Ranking sorts the full stats sequence with a stable sort: endpoints
//! with at least one success come first, ascending by mean latency,
//! with ties kept in registry order; endpoints without a success come
//! last, also in registry order. The sorted sequence is cut down to the
//! top ten rows. Rendering then prints one line per surviving row that
//! has a success; rows without one stay silent even when they made the
//! cut.

#![warn(clippy::missing_docs_in_private_items)]

use crate::registry::Registry;
use crate::round::ResolverStats;
use std::cmp::Ordering;
use std::io;

//------------ Configuration Constants ---------------------------------------

/// The maximum number of rows the ranking keeps.
pub const TOP_N: usize = 10;

//------------ RankedRow -----------------------------------------------------

/// One resolver's place in the final ranking.
#[derive(Clone, Debug)]
pub struct RankedRow<'a> {
    /// The provider name.
    provider: &'a str,

    /// The descriptor text as read from the input.
    stamp: &'a str,

    /// The totals accumulated for the resolver.
    stats: ResolverStats,
}

impl RankedRow<'_> {
    /// Returns the provider name.
    pub fn provider(&self) -> &str {
        self.provider
    }

    /// Returns the descriptor text.
    pub fn stamp(&self) -> &str {
        self.stamp
    }

    /// Returns the number of successful probes.
    pub fn times(&self) -> u32 {
        self.stats.times()
    }

    /// Returns the mean latency, if any probe succeeded.
    pub fn mean_ms(&self) -> Option<f64> {
        self.stats.mean_ms()
    }
}

//------------ rank ----------------------------------------------------------

/// Sorts the endpoints by mean latency and truncates to the top rows.
///
/// `stats` must hold one slot per registry index, as produced by the
/// round scheduler.
pub fn rank<'a>(
    registry: &'a Registry,
    stats: &[ResolverStats],
) -> Vec<RankedRow<'a>> {
    debug_assert_eq!(registry.len(), stats.len());
    let mut rows: Vec<_> = registry
        .iter()
        .zip(stats)
        .map(|(endpoint, stats)| RankedRow {
            provider: endpoint.provider(),
            stamp: endpoint.stamp(),
            stats: *stats,
        })
        .collect();
    // The sort is stable, so ties and the no-success tail keep their
    // registry order.
    rows.sort_by(|left, right| match (left.mean_ms(), right.mean_ms()) {
        (Some(left), Some(right)) => {
            left.partial_cmp(&right).unwrap_or(Ordering::Equal)
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    rows.truncate(TOP_N);
    rows
}

//------------ write_report --------------------------------------------------

/// Writes the final report.
pub fn write_report(
    rows: &[RankedRow<'_>],
    target: &mut impl io::Write,
) -> io::Result<()> {
    writeln!(target, "Average Elapsed|Test Times|Provider|Stamp")?;
    for row in rows {
        if let Some(mean) = row.mean_ms() {
            writeln!(
                target,
                "{:.2}|{}|{}|{}",
                mean,
                row.times(),
                row.provider(),
                row.stamp()
            )?;
        }
    }
    Ok(())
}

//============ Tests =========================================================
