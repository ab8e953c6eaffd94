// src/blocktime.rs

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::clock::Clock;

/// Blocks occupy inclusive second-granular intervals, so one boundary second
/// separates the end of a slot from the start of the next. Consecutive slot
/// starts are therefore spaced `slot_length + SLOT_BOUNDARY` apart.
const SLOT_BOUNDARY: Duration = Duration::from_secs(1);

/// Rejected configuration at construction time.
///
/// Negative durations and a missing clock are unrepresentable in the types,
/// so only the remaining two ways to hand in a broken schedule are covered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// `nodes_count` was zero; a fleet with no validators has no schedule.
    NoNodes,
    /// `block_gen_time + blocks_gap` does not fit in a `Duration`.
    SlotLengthOverflow,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoNodes => write!(f, "nodes count must be positive"),
            ConfigError::SlotLengthOverflow => write!(f, "slot length overflows duration"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Query-time failure. The only one: the observed instant precedes genesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTimeError {
    TimeBeforeGenesis,
}

impl fmt::Display for BlockTimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockTimeError::TimeBeforeGenesis => {
                write!(f, "current time is before the first block")
            }
        }
    }
}

impl std::error::Error for BlockTimeError {}

/// The slot an instant falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockGenerationState {
    /// Instant at which the slot began.
    pub start: SystemTime,
    /// Generation budget of the slot (`block_gen_time + blocks_gap`).
    pub duration: Duration,
    /// Zero-based index of the validator entitled to produce in this slot.
    pub node_position: u64,
}

/// Pure slot arithmetic, shared by every query path.
/// - `slot_length` is the per-slot generation budget (may be zero).
/// - `stride` is the spacing between consecutive slot starts
///   (`slot_length + SLOT_BOUNDARY`, so never zero).
/// - `nodes_count` is the validator cardinality N (always > 0).
#[derive(Debug, Clone, Copy)]
struct SlotGeometry {
    slot_length: Duration,
    stride: Duration,
    nodes_count: u64,
}

impl SlotGeometry {
    /// Index of the slot containing an instant `elapsed` past genesis.
    /// Floor division at nanosecond precision; the slot is half-open on the
    /// right, so `elapsed == (k + 1) * stride` already belongs to slot k + 1.
    #[inline]
    fn slot_index(&self, elapsed: Duration) -> u128 {
        elapsed.as_nanos() / self.stride.as_nanos()
    }

    /// Offset of slot `index`'s start from genesis.
    /// Cannot overflow: the offset never exceeds the elapsed duration the
    /// index was derived from.
    #[inline]
    fn start_offset(&self, index: u128) -> Duration {
        let nanos = index * self.stride.as_nanos();
        Duration::new(
            (nanos / 1_000_000_000) as u64,
            (nanos % 1_000_000_000) as u32,
        )
    }

    /// Validator entitled to produce in slot `index`.
    #[inline]
    fn node_position(&self, index: u128) -> u64 {
        (index % u128::from(self.nodes_count)) as u64
    }
}

/// Deterministic proposer schedule shared by the whole fleet.
///
/// Construction freezes the configuration; after that every result is a pure
/// function of `(config, observed instant)`, so any two nodes with the same
/// genesis parameters and synchronized clocks agree on who may produce. No
/// interior mutability, callable from any number of threads.
impl std::fmt::Debug for BlockTimeCalculator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockTimeCalculator")
            .field("first_block_time", &self.first_block_time)
            .field("geometry", &self.geometry)
            .finish()
    }
}

pub struct BlockTimeCalculator {
    clock: Arc<dyn Clock>,
    first_block_time: SystemTime,
    geometry: SlotGeometry,
}

impl BlockTimeCalculator {
    /// Behavior:
    /// - Fails with `ConfigError::NoNodes` when `nodes_count == 0`.
    /// - Fails with `ConfigError::SlotLengthOverflow` when the combined
    ///   durations do not fit in a `Duration`.
    pub fn new(
        clock: Arc<dyn Clock>,
        first_block_time: SystemTime,
        block_gen_time: Duration,
        blocks_gap: Duration,
        nodes_count: u64,
    ) -> Result<Self, ConfigError> {
        if nodes_count == 0 {
            return Err(ConfigError::NoNodes);
        }
        let slot_length = block_gen_time
            .checked_add(blocks_gap)
            .ok_or(ConfigError::SlotLengthOverflow)?;
        let stride = slot_length
            .checked_add(SLOT_BOUNDARY)
            .ok_or(ConfigError::SlotLengthOverflow)?;
        Ok(Self {
            clock,
            first_block_time,
            geometry: SlotGeometry {
                slot_length,
                stride,
                nodes_count,
            },
        })
    }

    /// Per-slot generation budget (`block_gen_time + blocks_gap`).
    #[inline]
    pub fn slot_length(&self) -> Duration {
        self.geometry.slot_length
    }

    /// Spacing between consecutive slot starts.
    #[inline]
    pub fn slot_stride(&self) -> Duration {
        self.geometry.stride
    }

    /// Period after which the slot-to-node mapping repeats (`stride * N`).
    /// Saturates for absurd rosters.
    pub fn round_length(&self) -> Duration {
        let n = u32::try_from(self.geometry.nodes_count).unwrap_or(u32::MAX);
        self.geometry.stride.saturating_mul(n)
    }

    /// State of the slot containing the clock's current instant.
    ///
    /// Behavior:
    /// - `TimeBeforeGenesis` iff `clock.now() < first_block_time`.
    /// - Degenerate `slot_length == 0` schedules report the sentinel
    ///   `{first_block_time, 0, 0}` for every instant; eligibility queries
    ///   never succeed against it.
    pub fn count_block_time(&self) -> Result<BlockGenerationState, BlockTimeError> {
        self.state_at(self.clock.now())
    }

    /// Whether the validator at `node_position` owns the current slot.
    /// Always `false` for a degenerate schedule. Positions are zero-based
    /// and compared by equality; callers own the numbering convention.
    pub fn time_to_generate(&self, node_position: u64) -> Result<bool, BlockTimeError> {
        let state = self.state_at(self.clock.now())?;
        Ok(!self.geometry.slot_length.is_zero() && state.node_position == node_position)
    }

    /// Whether a block claimed to have been produced at `at` by the validator
    /// at `node_position` matches the schedule. Same rules as
    /// `time_to_generate`, evaluated at the historical instant instead of the
    /// clock's.
    pub fn validate_block(
        &self,
        at: SystemTime,
        node_position: u64,
    ) -> Result<bool, BlockTimeError> {
        let state = self.state_at(at)?;
        Ok(!self.geometry.slot_length.is_zero() && state.node_position == node_position)
    }

    fn state_at(&self, at: SystemTime) -> Result<BlockGenerationState, BlockTimeError> {
        let elapsed = at
            .duration_since(self.first_block_time)
            .map_err(|_| BlockTimeError::TimeBeforeGenesis)?;

        if self.geometry.slot_length.is_zero() {
            return Ok(BlockGenerationState {
                start: self.first_block_time,
                duration: Duration::ZERO,
                node_position: 0,
            });
        }

        let index = self.geometry.slot_index(elapsed);
        Ok(BlockGenerationState {
            start: self.first_block_time + self.geometry.start_offset(index),
            duration: self.geometry.slot_length,
            node_position: self.geometry.node_position(index),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use std::time::UNIX_EPOCH;

    fn unix(secs: u64, nanos: u32) -> SystemTime {
        UNIX_EPOCH + Duration::new(secs, nanos)
    }

    fn calculator(
        first: SystemTime,
        gen_secs: u64,
        gap_secs: u64,
        nodes: u64,
        clock: Arc<FixedClock>,
    ) -> BlockTimeCalculator {
        BlockTimeCalculator::new(
            clock,
            first,
            Duration::from_secs(gen_secs),
            Duration::from_secs(gap_secs),
            nodes,
        )
        .unwrap()
    }

    struct Case {
        first: SystemTime,
        gen_secs: u64,
        gap_secs: u64,
        nodes: u64,
        now: SystemTime,
        expected: Result<BlockGenerationState, BlockTimeError>,
    }

    #[test]
    fn count_block_time_table() {
        let cases = [
            // current time before first block
            Case {
                first: unix(1, 0),
                gen_secs: 0,
                gap_secs: 0,
                nodes: 1,
                now: unix(0, 0),
                expected: Err(BlockTimeError::TimeBeforeGenesis),
            },
            // zero duration
            Case {
                first: unix(0, 0),
                gen_secs: 0,
                gap_secs: 0,
                nodes: 5,
                now: unix(0, 0),
                expected: Ok(BlockGenerationState {
                    start: unix(0, 0),
                    duration: Duration::ZERO,
                    node_position: 0,
                }),
            },
            // generation time only
            Case {
                first: unix(0, 0),
                gen_secs: 1,
                gap_secs: 0,
                nodes: 5,
                now: unix(0, 0),
                expected: Ok(BlockGenerationState {
                    start: unix(0, 0),
                    duration: Duration::from_secs(1),
                    node_position: 0,
                }),
            },
            // gap only
            Case {
                first: unix(0, 0),
                gen_secs: 0,
                gap_secs: 1,
                nodes: 5,
                now: unix(0, 0),
                expected: Ok(BlockGenerationState {
                    start: unix(0, 0),
                    duration: Duration::from_secs(1),
                    node_position: 0,
                }),
            },
            // combined duration
            Case {
                first: unix(0, 0),
                gen_secs: 4,
                gap_secs: 6,
                nodes: 5,
                now: unix(0, 0),
                expected: Ok(BlockGenerationState {
                    start: unix(0, 0),
                    duration: Duration::from_secs(10),
                    node_position: 0,
                }),
            },
            // lowest slot boundary
            Case {
                first: unix(0, 0),
                gen_secs: 1,
                gap_secs: 1,
                nodes: 10,
                now: unix(0, 0),
                expected: Ok(BlockGenerationState {
                    start: unix(0, 0),
                    duration: Duration::from_secs(2),
                    node_position: 0,
                }),
            },
            // highest slot boundary: 5.999999999s still falls in the first
            // slot (stride 6s), the instant at 6s belongs to the next
            Case {
                first: unix(0, 0),
                gen_secs: 2,
                gap_secs: 3,
                nodes: 10,
                now: unix(5, 999_999_999),
                expected: Ok(BlockGenerationState {
                    start: unix(0, 0),
                    duration: Duration::from_secs(5),
                    node_position: 0,
                }),
            },
            // wraps back to the first position after a full round
            Case {
                first: unix(0, 0),
                gen_secs: 0,
                gap_secs: 1,
                nodes: 3,
                now: unix(6, 0),
                expected: Ok(BlockGenerationState {
                    start: unix(6, 0),
                    duration: Duration::from_secs(1),
                    node_position: 0,
                }),
            },
            // one node
            Case {
                first: unix(0, 0),
                gen_secs: 2,
                gap_secs: 2,
                nodes: 1,
                now: unix(6, 0),
                expected: Ok(BlockGenerationState {
                    start: unix(5, 0),
                    duration: Duration::from_secs(4),
                    node_position: 0,
                }),
            },
            // custom first block time
            Case {
                first: unix(1, 0),
                gen_secs: 2,
                gap_secs: 3,
                nodes: 3,
                now: unix(13, 0),
                expected: Ok(BlockGenerationState {
                    start: unix(13, 0),
                    duration: Duration::from_secs(5),
                    node_position: 2,
                }),
            },
            // current time in the middle of an interval
            Case {
                first: unix(1, 0),
                gen_secs: 2,
                gap_secs: 3,
                nodes: 3,
                now: unix(16, 0),
                expected: Ok(BlockGenerationState {
                    start: unix(13, 0),
                    duration: Duration::from_secs(5),
                    node_position: 2,
                }),
            },
            // real life
            Case {
                first: unix(1_519_240_000, 0),
                gen_secs: 4,
                gap_secs: 5,
                nodes: 101,
                now: unix(1_519_241_010, 1234),
                expected: Ok(BlockGenerationState {
                    start: unix(1_519_241_010, 0),
                    duration: Duration::from_secs(9),
                    node_position: 0,
                }),
            },
        ];

        for (i, c) in cases.iter().enumerate() {
            let clock = Arc::new(FixedClock::new(c.now));
            let btc = calculator(c.first, c.gen_secs, c.gap_secs, c.nodes, clock);
            assert_eq!(btc.count_block_time(), c.expected, "case {i}");
        }
    }

    #[test]
    fn time_to_generate_matches_only_the_slot_owner() {
        // slot index 2 with three nodes: position 2 owns the slot
        let clock = Arc::new(FixedClock::at_unix(16, 0));
        let btc = calculator(unix(1, 0), 2, 3, 3, clock);
        assert_eq!(btc.time_to_generate(2), Ok(true));
        assert_eq!(btc.time_to_generate(0), Ok(false));
        assert_eq!(btc.time_to_generate(1), Ok(false));
        // out-of-range positions never match
        assert_eq!(btc.time_to_generate(3), Ok(false));
    }

    #[test]
    fn time_to_generate_before_genesis_fails() {
        let clock = Arc::new(FixedClock::at_unix(0, 0));
        let btc = calculator(unix(1, 0), 2, 3, 3, clock);
        assert_eq!(
            btc.time_to_generate(0),
            Err(BlockTimeError::TimeBeforeGenesis)
        );
    }

    #[test]
    fn degenerate_schedule_never_grants_a_turn() {
        let clock = Arc::new(FixedClock::at_unix(42, 0));
        let btc = calculator(unix(0, 0), 0, 0, 5, clock.clone());
        for position in 0..5 {
            assert_eq!(btc.time_to_generate(position), Ok(false));
        }
        // the sentinel state is the same whatever the instant
        let sentinel = BlockGenerationState {
            start: unix(0, 0),
            duration: Duration::ZERO,
            node_position: 0,
        };
        assert_eq!(btc.count_block_time(), Ok(sentinel));
        clock.advance(Duration::from_secs(1000));
        assert_eq!(btc.count_block_time(), Ok(sentinel));
        assert_eq!(btc.validate_block(unix(7, 0), 0), Ok(false));
    }

    #[test]
    fn validate_block_checks_historical_instants() {
        let clock = Arc::new(FixedClock::at_unix(1000, 0));
        let btc = calculator(unix(1, 0), 2, 3, 3, clock);
        // slot [13s, 19s) belongs to position 2
        assert_eq!(btc.validate_block(unix(13, 0), 2), Ok(true));
        assert_eq!(btc.validate_block(unix(16, 0), 2), Ok(true));
        assert_eq!(btc.validate_block(unix(16, 0), 1), Ok(false));
        // next slot belongs to position 0
        assert_eq!(btc.validate_block(unix(19, 0), 0), Ok(true));
        assert_eq!(
            btc.validate_block(unix(0, 0), 0),
            Err(BlockTimeError::TimeBeforeGenesis)
        );
    }

    #[test]
    fn frozen_clock_is_idempotent() {
        let clock = Arc::new(FixedClock::at_unix(16, 0));
        let btc = calculator(unix(1, 0), 2, 3, 3, clock);
        let first = btc.count_block_time();
        for _ in 0..10 {
            assert_eq!(btc.count_block_time(), first);
        }
    }

    #[test]
    fn advancing_one_stride_moves_one_position() {
        let clock = Arc::new(FixedClock::at_unix(1, 0));
        let btc = calculator(unix(1, 0), 2, 3, 3, clock.clone());
        let mut prev = btc.count_block_time().unwrap();
        assert_eq!(prev.node_position, 0);

        for _ in 0..7 {
            clock.advance(btc.slot_stride());
            let next = btc.count_block_time().unwrap();
            assert_eq!(next.start, prev.start + btc.slot_stride());
            assert_eq!(next.node_position, (prev.node_position + 1) % 3);
            assert_eq!(next.duration, prev.duration);
            prev = next;
        }
    }

    #[test]
    fn slot_edges_are_half_open_over_the_stride() {
        let first = unix(0, 0);
        let clock = Arc::new(FixedClock::at_unix(0, 0));
        let btc = calculator(first, 2, 3, 3, clock.clone());
        let stride = btc.slot_stride();

        // one nanosecond before the boundary: still the first slot
        clock.set(first + stride - Duration::from_nanos(1));
        assert_eq!(btc.count_block_time().unwrap().start, first);

        // exactly at the boundary: the next slot begins
        clock.set(first + stride);
        let state = btc.count_block_time().unwrap();
        assert_eq!(state.start, first + stride);
        assert_eq!(state.node_position, 1);
    }

    #[test]
    fn genesis_instant_is_slot_zero() {
        let clock = Arc::new(FixedClock::at_unix(50, 0));
        let btc = calculator(unix(50, 0), 3, 1, 4, clock);
        let state = btc.count_block_time().unwrap();
        assert_eq!(state.start, unix(50, 0));
        assert_eq!(state.node_position, 0);
    }

    #[test]
    fn rejects_empty_fleet() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::at_unix(0, 0));
        let err = BlockTimeCalculator::new(
            clock,
            unix(0, 0),
            Duration::from_secs(1),
            Duration::from_secs(1),
            0,
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::NoNodes);
    }

    #[test]
    fn rejects_slot_length_overflow() {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::at_unix(0, 0));
        let err = BlockTimeCalculator::new(
            clock,
            unix(0, 0),
            Duration::MAX,
            Duration::from_secs(1),
            3,
        )
        .unwrap_err();
        assert_eq!(err, ConfigError::SlotLengthOverflow);
    }

    #[test]
    fn round_length_is_stride_times_nodes() {
        let clock = Arc::new(FixedClock::at_unix(0, 0));
        let btc = calculator(unix(0, 0), 2, 3, 3, clock);
        assert_eq!(btc.slot_length(), Duration::from_secs(5));
        assert_eq!(btc.slot_stride(), Duration::from_secs(6));
        assert_eq!(btc.round_length(), Duration::from_secs(18));
    }
}
