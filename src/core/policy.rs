use super::models::{FillPattern, SanitizationProfile};

/*
 * Maps a sanitization profile to its ordered sequence of fill patterns. This
 * is the whole overwrite policy: a pure, total function over the closed
 * profile enum, with no I/O and no failure mode. `SinglePassDelete` maps to
 * an empty sequence because the leaf is deleted directly, without any
 * overwrite pass.
 */
pub fn pattern_sequence(profile: SanitizationProfile) -> &'static [FillPattern] {
    use FillPattern::*;
    match profile {
        SanitizationProfile::SinglePassDelete => &[],
        SanitizationProfile::ThreePassOverwrite => &[AllZero, AllOne, CryptographicRandom],
        SanitizationProfile::SevenPassOverwrite => &[
            AllZero,
            AllOne,
            AllZero,
            AllOne,
            AllZero,
            AllOne,
            CryptographicRandom,
        ],
    }
}
