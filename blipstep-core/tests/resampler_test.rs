// End-to-end behaviour of the resampler through its public operations.

use blipstep_core::clock::{HALF_WIDTH, MAX_RATIO, TIME_UNIT};
use blipstep_core::{BufferOverflowError, Resampler};

/// Clocks for one sample at the construction-time ratio.
const DEFAULT_CLOCKS_PER_SAMPLE: u32 = MAX_RATIO as u32;

fn configured(capacity: usize, clock_rate: f64, sample_rate: f64) -> Resampler {
    let mut b = Resampler::new(capacity);
    b.set_rates(clock_rate, sample_rate).unwrap();
    b.clear();
    b
}

fn drain(b: &mut Resampler) -> Vec<i16> {
    let mut out = vec![0i16; b.samples_avail()];
    let n = b.read_samples(&mut out, usize::MAX, 1);
    out.truncate(n);
    out
}

/// Common emulated clocks against common output rates.
const RATE_PAIRS: &[(f64, f64)] = &[
    (1_000_000.0, 44_100.0),
    (1_789_773.0, 48_000.0),
    (3_579_545.0, 44_100.0),
    (4_194_304.0, 48_000.0),
    (985_248.0, 22_050.0),
    (7_670_453.0, 96_000.0),
    (48_000.0, 48_000.0),
];

#[test]
fn factor_never_undercounts() {
    for &(clock, sample) in RATE_PAIRS {
        let b = configured(16, clock, sample);
        let exact = TIME_UNIT as f64 * sample / clock;
        let factor = b.clock().factor();
        assert!(factor as f64 >= exact, "{clock}->{sample}");
        assert!(((factor - 1) as f64) < exact, "{clock}->{sample}");
    }
}

#[test]
fn clocks_needed_delivers_requested_samples() {
    for &(clock, sample) in RATE_PAIRS {
        let mut b = configured(4096, clock, sample);
        let mut scratch = vec![0i16; 4096];
        for n in [1usize, 2, 17, 441, 800, 4000] {
            let clocks = b.clocks_needed(n);
            assert!(clocks > 0);
            b.end_frame(clocks).unwrap();
            assert!(b.samples_avail() >= n, "{clock}->{sample} n={n} got {}", b.samples_avail());
            b.read_samples(&mut scratch, usize::MAX, 1);
        }
    }
}

#[test]
fn clocks_needed_is_zero_past_capacity() {
    let mut b = configured(100, 1_000_000.0, 44_100.0);
    assert_eq!(b.clocks_needed(101), 0);
    b.end_frame(b.clocks_needed(60)).unwrap();
    assert_eq!(b.clocks_needed(100 - b.samples_avail() + 1), 0);
    assert!(b.clocks_needed(100 - b.samples_avail()) > 0);
}

#[test]
fn single_step_follows_table_shape() {
    // At the construction-time ratio, time 0 lands exactly on phase 0.
    let mut b = Resampler::new(64);
    b.add_delta(0, 10_000).unwrap();
    b.end_frame(20 * DEFAULT_CLOCKS_PER_SAMPLE).unwrap();
    assert_eq!(b.samples_avail(), 20);
    assert_eq!(
        drain(&mut b),
        [
            0, 13, -22, 84, -65, 282, 3, 1791, 8203, 9976, 9677, 10005, 9837, 9924, 9870, 9864,
            9844, 9825, 9806, 9787,
        ]
    );
}

#[test]
fn silence_reads_as_zeros() {
    let mut b = configured(512, 1_789_773.0, 48_000.0);
    let duration = 7_000;
    b.end_frame(duration).unwrap();

    let factor = u128::from(b.clock().factor());
    let expected = (u128::from(duration) * factor + factor / 2) / u128::from(TIME_UNIT);
    assert_eq!(b.samples_avail() as u128, expected);

    let out = drain(&mut b);
    assert_eq!(out.len() as u128, expected);
    assert!(out.iter().all(|&s| s == 0));
}

#[test]
fn rejected_delta_changes_nothing() {
    let mut a = configured(100, 1_000_000.0, 44_100.0);
    let mut b = a.clone();
    a.add_delta(200, 3000).unwrap();
    b.add_delta(200, 3000).unwrap();

    // 2500 clocks is ~110 samples: past capacity + guard.
    let err = a.add_delta(2_500, 5000).unwrap_err();
    assert_eq!(err, BufferOverflowError { requested: 110, limit: 102 });
    assert!(a.add_delta_fast(2_500, 5000).is_err());

    a.end_frame(2_000).unwrap();
    b.end_frame(2_000).unwrap();
    assert_eq!(drain(&mut a), drain(&mut b));
}

#[test]
fn saturates_at_exact_boundaries() {
    let mut up = Resampler::new(64);
    up.add_delta(0, 40_000).unwrap();
    up.end_frame(20 * DEFAULT_CLOCKS_PER_SAMPLE).unwrap();
    let out = drain(&mut up);
    assert_eq!(&out[..9], &[0, 52, -88, 339, -257, 1130, 12, 7166, 32767]);
    assert!(out[8..].iter().all(|&s| s == i16::MAX));

    let mut down = Resampler::new(64);
    down.add_delta(0, -40_000).unwrap();
    down.end_frame(20 * DEFAULT_CLOCKS_PER_SAMPLE).unwrap();
    let out = drain(&mut down);
    assert_eq!(&out[..9], &[0, -53, 87, -340, 256, -1131, -13, -7167, -32768]);
    assert!(out[8..].iter().all(|&s| s == i16::MIN));
}

#[test]
fn one_millisecond_frame_at_44k1() {
    let mut b = configured(100, 1_000_000.0, 44_100.0);
    b.add_delta(500, 1000).unwrap();
    b.end_frame(1000).unwrap();
    assert_eq!(b.samples_avail(), 44);

    let mut first = [i16::MIN; 1];
    assert_eq!(b.read_samples(&mut first, 1, 1), 1);
    assert_eq!(first[0], 0);
    assert_eq!(b.samples_avail(), 43);

    let rest = drain(&mut b);
    assert_eq!(
        rest,
        [
            0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, -3, 8, -6, 24,
            5, 143, 781, 1001, 964, 1001, 983, 992, 987, 986, 984, 982, 980, 978, 976, 975,
        ]
    );
}

#[test]
fn fast_delta_splits_at_sub_sample_position() {
    // t = 500 lands 2360/32768 of the way into sample 22, so slot 29 gets
    // 1000 * (32768 - 2360) and slot 30 gets 1000 * 2360.
    let mut b = configured(100, 1_000_000.0, 44_100.0);
    b.add_delta_fast(500, 1000).unwrap();
    b.end_frame(1000).unwrap();
    assert_eq!(b.samples_avail(), 44);

    let out = drain(&mut b);
    assert!(out[..30].iter().all(|&s| s == 0), "{:?}", &out[..30]);
    assert_eq!(
        &out[30..],
        &[927, 998, 996, 994, 992, 990, 988, 986, 984, 982, 980, 978, 976, 975]
    );
}

#[test]
fn kernel_carries_across_frames() {
    // A step near the end of a frame finishes in the next one.
    let mut split = configured(256, 1_000_000.0, 44_100.0);
    let mut whole = split.clone();

    split.add_delta(990, 2000).unwrap();
    split.end_frame(1000).unwrap();
    let mut out = drain(&mut split);
    split.end_frame(1000).unwrap();
    out.extend(drain(&mut split));

    whole.add_delta(990, 2000).unwrap();
    whole.end_frame(2000).unwrap();
    assert_eq!(out, drain(&mut whole));
}

#[test]
fn stereo_pair_interleaves() {
    let mut left = configured(128, 1_000_000.0, 44_100.0);
    let mut right = configured(128, 1_000_000.0, 44_100.0);
    left.add_delta(0, 8000).unwrap();
    right.add_delta(0, -8000).unwrap();
    left.end_frame(1500).unwrap();
    right.end_frame(1500).unwrap();

    let frames = left.samples_avail();
    let mut out = vec![0i16; frames * 2];
    assert_eq!(left.read_samples(&mut out, frames, 2), frames);
    assert_eq!(right.read_samples(&mut out[1..], frames, 2), frames);
    for frame in out.chunks(2).skip(HALF_WIDTH + 2) {
        assert!(frame[0] > 7000 && frame[1] < -7000, "{frame:?}");
    }
}
