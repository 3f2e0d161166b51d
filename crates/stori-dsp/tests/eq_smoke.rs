use stori_dsp::{EqBand, ThreeBandEq};

#[test]
fn full_boost_eq_is_stable() {
    let mut eq = ThreeBandEq::new(44_100.0);
    for band in EqBand::ALL {
        eq.set_gain_db(band, 12.0);
    }
    let mut samples = vec![1.0f32; 10_000];
    eq.process(0, &mut samples);
    assert!(samples.iter().all(|s| s.is_finite()));
}
