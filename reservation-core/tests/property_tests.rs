//! Property-based tests for solution attestation
//!
//! - Round trip: every signed solution verifies
//! - Tamper evidence: changing any single field breaks the signature
//! - Key binding: a different key never verifies

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use reservation_core::{
    signer::verify_with_public_key, Coordinate, KeyPair, Location, MachineType, Solution,
    SolutionSigner, Station,
};
use rust_decimal::Decimal;

/// Strategy for locations
fn location_strategy() -> impl Strategy<Value = Location> {
    (-90.0f64..90.0, -180.0f64..180.0, "[A-Za-z0-9 ]{0,24}").prop_map(|(lat, lon, address)| {
        Location {
            coordinate: Coordinate { lat, lon },
            address,
        }
    })
}

fn machine_type_strategy() -> impl Strategy<Value = MachineType> {
    prop_oneof![
        Just(MachineType::DroneOnly),
        Just(MachineType::RobotOnly),
        Just(MachineType::Both),
    ]
}

fn station_strategy() -> impl Strategy<Value = Station> {
    prop_oneof![
        Just(Station::NotInStation),
        Just(Station::Station0),
        Just(Station::Station1),
        Just(Station::Station2),
    ]
}

fn time_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (1_600_000_000i64..1_900_000_000i64).prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}

/// Strategy for well-formed solutions
fn solution_strategy() -> impl Strategy<Value = Solution> {
    (
        location_strategy(),
        location_strategy(),
        time_strategy(),
        (0i64..3600, 0i64..3600, 0i64..3600),
        station_strategy(),
        machine_type_strategy(),
        0i64..1_000_000,
        0.0f64..50.0,
    )
        .prop_map(
            |(start, dest, quoted_at, (to_pickup, to_dropoff, to_end), station, machine_type, cents, weight)| {
                let pickup_time = quoted_at + Duration::seconds(to_pickup);
                let dropoff_time = pickup_time + Duration::seconds(to_dropoff);
                Solution {
                    starting_point: start,
                    destination: dest,
                    quoted_at,
                    start_time: quoted_at,
                    pickup_time,
                    dropoff_time,
                    end_time: dropoff_time + Duration::seconds(to_end),
                    station,
                    machine_type,
                    price: Decimal::new(cents, 2),
                    weight,
                }
            },
        )
}

/// Apply one of the single-field mutations, guaranteed to change the value
fn tamper(solution: &Solution, field: usize) -> Solution {
    let mut s = solution.clone();
    match field {
        0 => s.starting_point.coordinate.lat += 0.001,
        1 => s.starting_point.coordinate.lon -= 0.001,
        2 => s.starting_point.address.push('x'),
        3 => s.destination.coordinate.lat -= 0.001,
        4 => s.destination.coordinate.lon += 0.001,
        5 => s.destination.address.push('y'),
        6 => s.quoted_at += Duration::seconds(1),
        7 => s.start_time -= Duration::seconds(1),
        8 => s.pickup_time += Duration::milliseconds(1),
        9 => s.dropoff_time += Duration::seconds(1),
        10 => s.end_time += Duration::seconds(1),
        11 => {
            s.station = match s.station {
                Station::NotInStation => Station::Station0,
                _ => Station::NotInStation,
            }
        }
        12 => {
            s.machine_type = match s.machine_type {
                MachineType::DroneOnly => MachineType::RobotOnly,
                _ => MachineType::DroneOnly,
            }
        }
        13 => s.price += Decimal::new(1, 2),
        _ => s.weight += 0.25,
    }
    s
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Every signed solution verifies with the signing key
    #[test]
    fn prop_sign_then_verify(solution in solution_strategy(), seed in any::<[u8; 32]>()) {
        let signer = SolutionSigner::new(KeyPair::from_seed(&seed));
        let signature = signer.sign(&solution);

        prop_assert!(signer.verify(&solution, &signature));
        prop_assert!(verify_with_public_key(&solution, &signature, &signer.public_key()));
    }

    /// A single-field change invalidates the signature
    #[test]
    fn prop_single_field_tamper_detected(solution in solution_strategy(), field in 0usize..15) {
        let signer = SolutionSigner::new(KeyPair::from_seed(&[9u8; 32]));
        let signature = signer.sign(&solution);

        let altered = tamper(&solution, field);
        prop_assert_ne!(&altered, &solution);
        prop_assert!(!signer.verify(&altered, &signature));
    }

    /// Signatures are bound to the key pair that produced them
    #[test]
    fn prop_other_key_rejects(solution in solution_strategy()) {
        let signer = SolutionSigner::new(KeyPair::from_seed(&[1u8; 32]));
        let other = SolutionSigner::new(KeyPair::from_seed(&[2u8; 32]));

        let signature = other.sign(&solution);
        prop_assert!(!signer.verify(&solution, &signature));
    }

    /// Digest is stable and tracks the signed content
    #[test]
    fn prop_digest_tracks_content(solution in solution_strategy(), field in 0usize..15) {
        let signer = SolutionSigner::new(KeyPair::from_seed(&[3u8; 32]));
        prop_assert_eq!(signer.digest(&solution), signer.digest(&solution.clone()));
        prop_assert_ne!(signer.digest(&solution), signer.digest(&tamper(&solution, field)));
    }
}
