#![allow(dead_code)]

use std::time::Duration;

use dispatch_core::model::{Ride, RideStatus, Trip, VehicleTier};
use dispatch_core::test_helpers::{self, TestDispatch};
use uuid::Uuid;

/// Poll until the ride reaches `wanted`, panicking after a few seconds.
/// Background matching runs on a spawned task, so tests observe its result
/// by watching the ride's status converge.
pub async fn wait_for_status(harness: &TestDispatch, ride_id: Uuid, wanted: RideStatus) -> Ride {
    let polled = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let ride = harness
                .dispatch
                .rides
                .ride(ride_id)
                .await
                .expect("ride lookup");
            if ride.status == wanted {
                return ride;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    polled.unwrap_or_else(|_| panic!("ride {ride_id} never reached {wanted}"))
}

/// Drive a fresh ride through matching and acceptance.
pub async fn matched_and_accepted(harness: &TestDispatch) -> (Ride, Uuid) {
    let driver_id = test_helpers::seed_driver(harness, VehicleTier::Economy, 4.8).await;
    let rider_id = Uuid::new_v4();
    let ride = harness
        .dispatch
        .rides
        .create_ride(test_helpers::ride_request(rider_id))
        .await
        .expect("create ride");
    wait_for_status(harness, ride.id, RideStatus::Matched).await;
    let ride = harness
        .dispatch
        .rides
        .accept_ride(ride.id, driver_id)
        .await
        .expect("accept ride");
    (ride, driver_id)
}

/// Full happy path up to a completed trip, ready for settlement.
pub async fn completed_trip(harness: &TestDispatch) -> (Ride, Trip) {
    let (ride, _driver_id) = matched_and_accepted(harness).await;
    let trip = harness
        .dispatch
        .trips
        .start_trip(ride.id)
        .await
        .expect("start trip");
    let trip = harness
        .dispatch
        .trips
        .end_trip(dispatch_core::model::EndTripRequest {
            trip_id: trip.id,
            end_latitude: test_helpers::DROPOFF_LAT,
            end_longitude: test_helpers::DROPOFF_LON,
            distance_km: 12.5,
        })
        .await
        .expect("end trip");
    let ride = harness
        .dispatch
        .rides
        .ride(ride.id)
        .await
        .expect("ride lookup");
    (ride, trip)
}
