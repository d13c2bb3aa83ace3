// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

fn v(s: &str) -> HandlerVersion {
    HandlerVersion::parse(s).unwrap()
}

#[yare::parameterized(
    single        = { "1" },
    dotted        = { "1.0.0" },
    large         = { "2.1.1998.901" },
    leading_zero  = { "1.02.3" },
)]
fn parse_valid(s: &str) {
    assert!(HandlerVersion::parse(s).is_ok());
}

#[yare::parameterized(
    empty         = { "" },
    alpha         = { "1.0a" },
    trailing_dot  = { "1.2." },
    double_dot    = { "1..2" },
    negative      = { "-1.0" },
    wildcard      = { "1.*" },
)]
fn parse_invalid(s: &str) {
    assert!(HandlerVersion::parse(s).is_err());
}

#[test]
fn ordering_is_numeric_not_lexicographic() {
    assert!(v("1.10") > v("1.9"));
    assert!(v("1.2.10") > v("1.2.9"));
    assert!(v("2.0") > v("1.99.99"));
}

#[test]
fn missing_trailing_components_read_as_zero() {
    assert_eq!(v("1.2"), v("1.2.0"));
    assert_eq!(v("1"), v("1.0.0.0"));
    assert!(v("1.2") < v("1.2.1"));
}

#[test]
fn display_round_trips_parsed_form() {
    assert_eq!(v("1.0.0").to_string(), "1.0.0");
    assert_eq!(v("2.1").to_string(), "2.1");
}

#[test]
fn sort_ascending() {
    let mut versions = vec![v("1.1.2"), v("1.0.0"), v("2.0.0"), v("1.0.5")];
    versions.sort();
    let strings: Vec<String> = versions.iter().map(|x| x.to_string()).collect();
    assert_eq!(strings, ["1.0.0", "1.0.5", "1.1.2", "2.0.0"]);
}

#[yare::parameterized(
    exact_hit          = { "1.0.0", "1.0.0", true },
    exact_padded       = { "1.0", "1.0.0", true },
    exact_miss         = { "1.0.0", "1.0.1", false },
    family_hit         = { "1.*", "1.1.2", true },
    family_self        = { "1.*", "1", true },
    family_miss        = { "1.*", "2.0.0", false },
    nested_family_hit  = { "1.2.*", "1.2.9.9", true },
    nested_family_miss = { "1.2.*", "1.3.0", false },
    full_wildcard      = { "*", "7.7", true },
)]
fn spec_matching(spec: &str, version: &str, expected: bool) {
    let spec = VersionSpec::parse(spec).unwrap();
    assert_eq!(spec.matches(&v(version)), expected);
}

#[yare::parameterized(
    inner_wildcard   = { "1.*.2" },
    partial_wildcard = { "1.2*" },
    empty            = { "" },
)]
fn spec_invalid(s: &str) {
    assert!(VersionSpec::parse(s).is_err());
}

proptest! {
    #[test]
    fn ordering_matches_zero_padded_component_compare(
        a in proptest::collection::vec(0u64..1000, 1..5),
        b in proptest::collection::vec(0u64..1000, 1..5),
    ) {
        let fmt = |c: &[u64]| c.iter().map(u64::to_string).collect::<Vec<_>>().join(".");
        let (va, vb) = (v(&fmt(&a)), v(&fmt(&b)));

        let len = a.len().max(b.len());
        let pad = |c: &[u64]| {
            let mut p = c.to_vec();
            p.resize(len, 0);
            p
        };
        prop_assert_eq!(va.cmp(&vb), pad(&a).cmp(&pad(&b)));
    }
}
