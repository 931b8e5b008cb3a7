use crate::core::scoring::ScoreMatrix;
use crate::error::{MatchingError, MatchingResult};
use crate::models::GroupPolicy;

/// Minimum gain for a swap to count as an improvement
const SWAP_EPSILON: f64 = 1e-12;

/// Partition of participant indices produced by the assigner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// Tables in creation order, members sorted by index
    pub groups: Vec<Vec<usize>>,
    /// Participants that could not be seated, sorted by index
    pub unmatched: Vec<usize>,
}

/// Assign participants to tables
///
/// Indices refer to rows of `matrix`, which must follow participant id order
/// so that index ties equal id ties.
///
/// # Pipeline Stages
/// 1. Seeding: each planned table starts from the best eligible unassigned pair
/// 2. Growth: tables take turns adding their best eligible candidate
/// 3. Leftovers: undersized tables dissolve, stranded participants are offered
///    to tables with room or seed fresh tables, the rest stay unmatched
/// 4. Local improvement: bounded passes of improving member swaps
///
/// The result is a pure function of the matrix and the policy.
pub fn assign_groups(matrix: &ScoreMatrix, policy: &GroupPolicy) -> Assignment {
    let mut state = AssignmentState::new(matrix, policy);

    let capacities = planned_capacities(matrix.len(), policy);
    state.seed_planned_groups(&capacities);
    state.grow_to(&capacities);
    state.settle_leftovers();
    let swaps = state.improve_by_swaps();

    let assignment = state.finish();

    tracing::debug!(
        "Assigned {} participants to {} tables ({} unmatched, {} swaps)",
        matrix.len(),
        assignment.groups.len(),
        assignment.unmatched.len(),
        swaps
    );

    assignment
}

/// Number of tables to open and their balanced capacities
///
/// Opens `target_groups` tables if set, otherwise as many as fit, never more
/// than `n / min_size`. Capacities differ by at most one and never exceed
/// `max_size`.
pub fn planned_capacities(n: usize, policy: &GroupPolicy) -> Vec<usize> {
    if policy.min_size == 0 {
        return Vec::new();
    }

    let fit = n / policy.min_size;
    let count = match policy.target_groups {
        Some(target) => target.min(fit),
        None => fit,
    };
    if count == 0 {
        return Vec::new();
    }

    let base = n / count;
    let extra = n % count;

    (0..count)
        .map(|i| (base + usize::from(i < extra)).min(policy.max_size))
        .collect()
}

/// Mean pairwise score of a table
pub fn group_score(matrix: &ScoreMatrix, members: &[usize]) -> f64 {
    let pairs = pair_count(members.len());
    if pairs == 0.0 {
        return 0.0;
    }

    let mut sum = 0.0;
    for (k, &a) in members.iter().enumerate() {
        for &b in &members[k + 1..] {
            sum += matrix.score(a, b);
        }
    }

    sum / pairs
}

/// Check the partition against every structural invariant
///
/// # Errors
/// `InvariantViolation` if an index is out of range, placed twice, missing,
/// seated at a table of illegal size or next to an ineligible neighbour.
pub fn validate_assignment(
    matrix: &ScoreMatrix,
    policy: &GroupPolicy,
    assignment: &Assignment,
) -> MatchingResult<()> {
    let n = matrix.len();
    let mut seen = vec![false; n];

    for (table, group) in assignment.groups.iter().enumerate() {
        if group.len() < policy.min_size || group.len() > policy.max_size {
            return Err(MatchingError::InvariantViolation(format!(
                "table {} has {} members, allowed {}-{}",
                table + 1,
                group.len(),
                policy.min_size,
                policy.max_size
            )));
        }

        for (k, &member) in group.iter().enumerate() {
            if member >= n {
                return Err(MatchingError::InvariantViolation(format!(
                    "table {} references unknown participant index {}",
                    table + 1,
                    member
                )));
            }
            if seen[member] {
                return Err(MatchingError::InvariantViolation(format!(
                    "participant index {} is seated twice",
                    member
                )));
            }
            seen[member] = true;

            if let Some(&other) = group[k + 1..].iter().find(|&&o| !matrix.is_eligible(member, o)) {
                return Err(MatchingError::InvariantViolation(format!(
                    "table {} seats ineligible pair {} and {}",
                    table + 1,
                    member,
                    other
                )));
            }
        }
    }

    for &member in &assignment.unmatched {
        if member >= n || seen[member] {
            return Err(MatchingError::InvariantViolation(format!(
                "unmatched participant index {} is unknown or already seated",
                member
            )));
        }
        seen[member] = true;
    }

    if let Some(missing) = seen.iter().position(|s| !s) {
        return Err(MatchingError::InvariantViolation(format!(
            "participant index {} is neither seated nor unmatched",
            missing
        )));
    }

    Ok(())
}

#[inline]
fn pair_count(size: usize) -> f64 {
    (size * size.saturating_sub(1) / 2) as f64
}

struct AssignmentState<'a> {
    matrix: &'a ScoreMatrix,
    policy: &'a GroupPolicy,
    groups: Vec<Vec<usize>>,
    assigned: Vec<bool>,
}

impl<'a> AssignmentState<'a> {
    fn new(matrix: &'a ScoreMatrix, policy: &'a GroupPolicy) -> Self {
        Self {
            matrix,
            policy,
            groups: Vec::new(),
            assigned: vec![false; matrix.len()],
        }
    }

    fn seed_planned_groups(&mut self, capacities: &[usize]) {
        let blocked = vec![false; self.matrix.len()];
        for _ in capacities {
            match self.best_seed_pair(&blocked) {
                Some(pair) => self.open_group(pair),
                None => break,
            }
        }
    }

    fn open_group(&mut self, (a, b): (usize, usize)) {
        self.groups.push(vec![a, b]);
        self.assigned[a] = true;
        self.assigned[b] = true;
    }

    /// Highest-scoring eligible unassigned pair, lowest indices on ties
    fn best_seed_pair(&self, blocked: &[bool]) -> Option<(usize, usize)> {
        let n = self.matrix.len();
        let mut best: Option<(usize, usize, f64)> = None;

        for i in 0..n {
            if self.assigned[i] || blocked[i] {
                continue;
            }
            for j in (i + 1)..n {
                if self.assigned[j] || blocked[j] || !self.matrix.is_eligible(i, j) {
                    continue;
                }
                let score = self.matrix.score(i, j);
                if best.map_or(true, |(_, _, b)| score > b) {
                    best = Some((i, j, score));
                }
            }
        }

        best.map(|(i, j, _)| (i, j))
    }

    /// Unassigned candidate eligible with every member that adds the most score
    fn best_addition(&self, group: &[usize]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;

        for candidate in 0..self.matrix.len() {
            if self.assigned[candidate]
                || !group.iter().all(|&m| self.matrix.is_eligible(candidate, m))
            {
                continue;
            }
            let gain: f64 = group.iter().map(|&m| self.matrix.score(candidate, m)).sum();
            if best.map_or(true, |(_, b)| gain > b) {
                best = Some((candidate, gain));
            }
        }

        best.map(|(c, _)| c)
    }

    /// Round-robin growth; table `g` stops at `caps[g]` members
    fn grow_to(&mut self, caps: &[usize]) {
        loop {
            let mut progressed = false;

            for g in 0..self.groups.len() {
                let cap = caps.get(g).copied().unwrap_or(0);
                if self.groups[g].len() >= cap {
                    continue;
                }
                if let Some(candidate) = self.best_addition(&self.groups[g]) {
                    self.groups[g].push(candidate);
                    self.assigned[candidate] = true;
                    progressed = true;
                }
            }

            if !progressed {
                break;
            }
        }
    }

    fn settle_leftovers(&mut self) {
        let min = self.policy.min_size;
        let max = self.policy.max_size;

        // Undersized tables get first pick of whoever is left
        let caps: Vec<usize> = self
            .groups
            .iter()
            .map(|g| if g.len() < min { min } else { 0 })
            .collect();
        self.grow_to(&caps);

        self.dissolve_undersized();

        let caps = vec![max; self.groups.len()];
        self.grow_to(&caps);

        self.seed_fresh_groups();
    }

    fn dissolve_undersized(&mut self) {
        let min = self.policy.min_size;
        let (kept, dissolved): (Vec<_>, Vec<_>) = std::mem::take(&mut self.groups)
            .into_iter()
            .partition(|g| g.len() >= min);

        for group in dissolved {
            tracing::debug!("Dissolving undersized table of {} members", group.len());
            for member in group {
                self.assigned[member] = false;
            }
        }

        self.groups = kept;
    }

    /// Try to seat the remainder at new tables of at least `min_size`
    ///
    /// A seed that cannot grow to `min_size` is undone and its first member
    /// barred from seeding again, so the loop ends after at most n failures.
    fn seed_fresh_groups(&mut self) {
        let n = self.matrix.len();
        let min = self.policy.min_size;
        let max = self.policy.max_size;
        let mut blocked = vec![false; n];

        loop {
            if let Some(target) = self.policy.target_groups {
                if self.groups.len() >= target {
                    break;
                }
            }
            let available = self.assigned.iter().filter(|a| !**a).count();
            if available < min {
                break;
            }
            let Some((a, b)) = self.best_seed_pair(&blocked) else {
                break;
            };

            self.open_group((a, b));
            let fresh = self.groups.len() - 1;
            let mut caps = vec![0; self.groups.len()];
            caps[fresh] = max;
            self.grow_to(&caps);

            if self.groups[fresh].len() < min {
                if let Some(group) = self.groups.pop() {
                    for member in group {
                        self.assigned[member] = false;
                    }
                }
                blocked[a] = true;
            }
        }
    }

    /// Hill-climb with member swaps between tables; returns swaps applied
    fn improve_by_swaps(&mut self) -> usize {
        let mut swaps = 0;

        for pass in 0..self.policy.swap_pass_budget {
            let mut improved = false;

            for x in 0..self.groups.len() {
                for y in (x + 1)..self.groups.len() {
                    if let Some((ia, ib)) = self.best_swap(x, y) {
                        let a = self.groups[x][ia];
                        let b = self.groups[y][ib];
                        self.groups[x][ia] = b;
                        self.groups[y][ib] = a;
                        improved = true;
                        swaps += 1;
                    }
                }
            }

            if !improved {
                tracing::trace!("Swap search converged after {} passes", pass + 1);
                break;
            }
        }

        swaps
    }

    /// Best strictly improving swap between tables `x` and `y`
    fn best_swap(&self, x: usize, y: usize) -> Option<(usize, usize)> {
        let gx = &self.groups[x];
        let gy = &self.groups[y];
        let px = pair_count(gx.len());
        let py = pair_count(gy.len());
        if px == 0.0 || py == 0.0 {
            return None;
        }

        let mut best: Option<(usize, usize, f64)> = None;

        for (ia, &a) in gx.iter().enumerate() {
            for (ib, &b) in gy.iter().enumerate() {
                // b takes a's seat in x, a takes b's seat in y
                if !gx.iter().all(|&m| m == a || self.matrix.is_eligible(b, m))
                    || !gy.iter().all(|&m| m == b || self.matrix.is_eligible(a, m))
                {
                    continue;
                }

                let x_delta = self.contribution(b, gx, a) - self.contribution(a, gx, a);
                let y_delta = self.contribution(a, gy, b) - self.contribution(b, gy, b);
                let delta = x_delta / px + y_delta / py;

                if delta > SWAP_EPSILON && best.map_or(true, |(_, _, d)| delta > d) {
                    best = Some((ia, ib, delta));
                }
            }
        }

        best.map(|(ia, ib, _)| (ia, ib))
    }

    /// Score between `p` and the members of `group` other than `skip` and itself
    #[inline]
    fn contribution(&self, p: usize, group: &[usize], skip: usize) -> f64 {
        group
            .iter()
            .filter(|&&m| m != skip && m != p)
            .map(|&m| self.matrix.score(p, m))
            .sum()
    }

    fn finish(mut self) -> Assignment {
        for group in self.groups.iter_mut() {
            group.sort_unstable();
        }

        let unmatched = (0..self.assigned.len())
            .filter(|&i| !self.assigned[i])
            .collect();

        Assignment {
            groups: self.groups,
            unmatched,
        }
    }
}
