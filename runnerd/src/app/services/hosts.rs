// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2026 Alex Sizykh

use rand::Rng;

use crate::app::types::SubmissionHost;

/// Pick a submission host uniformly at random. No affinity and no health
/// checking: a failure of the chosen host fails the dispatch.
pub fn select_host(pool: &[SubmissionHost]) -> Option<&SubmissionHost> {
    select_host_with(pool, &mut rand::rng())
}

pub fn select_host_with<'a, R: Rng>(
    pool: &'a [SubmissionHost],
    rng: &mut R,
) -> Option<&'a SubmissionHost> {
    if pool.is_empty() {
        return None;
    }
    pool.get(rng.random_range(0..pool.len()))
}
