mod support;

use dispatch_core::config::DispatchConfig;
use dispatch_core::error::DispatchError;
use dispatch_core::model::{
    DriverStatus, EndTripRequest, RideStatus, TripStatus, VehicleTier,
};
use dispatch_core::store::DriverStore;
use dispatch_core::test_helpers::{self, build_dispatch, ride_request, StubGateway};
use support::{matched_and_accepted, wait_for_status};
use uuid::Uuid;

fn end_request(trip_id: Uuid, distance_km: f64) -> EndTripRequest {
    EndTripRequest {
        trip_id,
        end_latitude: test_helpers::DROPOFF_LAT,
        end_longitude: test_helpers::DROPOFF_LON,
        distance_km,
    }
}

#[tokio::test]
async fn trip_cannot_start_before_acceptance() {
    let harness = build_dispatch(DispatchConfig::default(), StubGateway::approving());
    test_helpers::seed_driver(&harness, VehicleTier::Economy, 4.9).await;

    let ride = harness
        .dispatch
        .rides
        .create_ride(ride_request(Uuid::new_v4()))
        .await
        .expect("create ride");
    wait_for_status(&harness, ride.id, RideStatus::Matched).await;

    let err = harness
        .dispatch
        .trips
        .start_trip(ride.id)
        .await
        .expect_err("matched but unaccepted ride cannot start a trip");
    assert!(matches!(
        err,
        DispatchError::InvalidRideState {
            status: RideStatus::Matched,
            ..
        }
    ));
}

#[tokio::test]
async fn trip_starts_from_accepted_and_from_driver_arrived() {
    let harness = build_dispatch(DispatchConfig::default(), StubGateway::approving());

    let (ride, _driver) = matched_and_accepted(&harness).await;
    let trip = harness
        .dispatch
        .trips
        .start_trip(ride.id)
        .await
        .expect("start from accepted");
    assert_eq!(trip.status, TripStatus::Started);
    assert_eq!(trip.surge_multiplier, ride.surge_multiplier);

    let (ride2, driver2) = matched_and_accepted(&harness).await;
    harness
        .dispatch
        .rides
        .driver_arrived(ride2.id, driver2)
        .await
        .expect("arrival");
    let trip2 = harness
        .dispatch
        .trips
        .start_trip(ride2.id)
        .await
        .expect("start from driver-arrived");
    assert_eq!(trip2.status, TripStatus::Started);

    let in_progress = harness.dispatch.rides.ride(ride2.id).await.expect("ride");
    assert_eq!(in_progress.status, RideStatus::InProgress);
    assert!(in_progress.started_at.is_some());
}

#[tokio::test]
async fn second_trip_for_the_same_ride_is_rejected() {
    let harness = build_dispatch(DispatchConfig::default(), StubGateway::approving());
    let (ride, _driver) = matched_and_accepted(&harness).await;

    harness
        .dispatch
        .trips
        .start_trip(ride.id)
        .await
        .expect("first start");
    let err = harness
        .dispatch
        .trips
        .start_trip(ride.id)
        .await
        .expect_err("one trip per ride");
    // The ride has left Accepted, so the status gate fires first; a racing
    // start that slipped past it would hit TripAlreadyStarted instead.
    assert!(matches!(
        err,
        DispatchError::InvalidRideState { .. } | DispatchError::TripAlreadyStarted(_)
    ));
}

#[tokio::test]
async fn pause_and_resume_accumulate_paused_time() {
    let harness = build_dispatch(DispatchConfig::default(), StubGateway::approving());
    let (ride, _driver) = matched_and_accepted(&harness).await;
    let trip = harness
        .dispatch
        .trips
        .start_trip(ride.id)
        .await
        .expect("start");

    let paused = harness
        .dispatch
        .trips
        .pause_trip(trip.id)
        .await
        .expect("pause");
    assert_eq!(paused.status, TripStatus::Paused);
    assert!(paused.paused_at.is_some());

    // Pause bookkeeping uses wall-clock timestamps, so sleep for real.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;

    let resumed = harness
        .dispatch
        .trips
        .resume_trip(trip.id)
        .await
        .expect("resume");
    assert_eq!(resumed.status, TripStatus::Resumed);
    assert!(resumed.paused_at.is_none());
    assert!(resumed.paused_duration_seconds >= 1);

    let err = harness
        .dispatch
        .trips
        .resume_trip(trip.id)
        .await
        .expect_err("resume requires a paused trip");
    assert!(matches!(err, DispatchError::InvalidTripState { .. }));
}

#[tokio::test]
async fn ending_a_trip_completes_the_ride_and_frees_the_driver() {
    let harness = build_dispatch(DispatchConfig::default(), StubGateway::approving());
    let (ride, driver_id) = matched_and_accepted(&harness).await;
    let trip = harness
        .dispatch
        .trips
        .start_trip(ride.id)
        .await
        .expect("start");

    let ended = harness
        .dispatch
        .trips
        .end_trip(end_request(trip.id, 12.5))
        .await
        .expect("end");
    assert_eq!(ended.status, TripStatus::Ended);
    assert_eq!(ended.distance_km, 12.5);
    assert!(ended.end_time.is_some());
    let fare = ended.total_fare.expect("fare");
    // 50 base + 12.5 km * 12, duration ~0 min, surge 1.0.
    assert_eq!(fare, 200.0);

    let completed = harness.dispatch.rides.ride(ride.id).await.expect("ride");
    assert_eq!(completed.status, RideStatus::Completed);
    assert!(completed.ended_at.is_some());

    let record = harness
        .dispatch
        .driver_store()
        .get(driver_id)
        .await
        .expect("driver lookup")
        .expect("driver");
    assert_eq!(record.status, DriverStatus::Available);
}

#[tokio::test]
async fn short_trip_fare_is_floored_at_the_minimum() {
    let harness = build_dispatch(DispatchConfig::default(), StubGateway::approving());
    let (ride, _driver) = matched_and_accepted(&harness).await;
    let trip = harness
        .dispatch
        .trips
        .start_trip(ride.id)
        .await
        .expect("start");

    let ended = harness
        .dispatch
        .trips
        .end_trip(end_request(trip.id, 0.5))
        .await
        .expect("end");
    assert_eq!(ended.total_fare, Some(70.0));
}

#[tokio::test]
async fn ended_trip_cannot_be_ended_or_paused_again() {
    let harness = build_dispatch(DispatchConfig::default(), StubGateway::approving());
    let (ride, _driver) = matched_and_accepted(&harness).await;
    let trip = harness
        .dispatch
        .trips
        .start_trip(ride.id)
        .await
        .expect("start");
    harness
        .dispatch
        .trips
        .end_trip(end_request(trip.id, 3.0))
        .await
        .expect("end");

    let err = harness
        .dispatch
        .trips
        .end_trip(end_request(trip.id, 3.0))
        .await
        .expect_err("double end must fail");
    assert!(matches!(
        err,
        DispatchError::InvalidTripState {
            status: TripStatus::Ended,
            ..
        }
    ));
    let err = harness
        .dispatch
        .trips
        .pause_trip(trip.id)
        .await
        .expect_err("pause after end must fail");
    assert!(matches!(err, DispatchError::InvalidTripState { .. }));
}

#[tokio::test]
async fn ending_a_trip_after_mid_trip_cancellation_is_rejected() {
    let harness = build_dispatch(DispatchConfig::default(), StubGateway::approving());
    let (ride, _driver) = matched_and_accepted(&harness).await;
    let trip = harness
        .dispatch
        .trips
        .start_trip(ride.id)
        .await
        .expect("start");

    // Cancelling a ride that is in progress is legal and terminal.
    harness
        .dispatch
        .rides
        .cancel_ride(ride.id, "rider emergency")
        .await
        .expect("cancel mid-trip");

    let err = harness
        .dispatch
        .trips
        .end_trip(end_request(trip.id, 4.0))
        .await
        .expect_err("ending after cancellation must fail");
    assert!(matches!(
        err,
        DispatchError::InvalidRideState {
            status: RideStatus::Cancelled,
            ..
        }
    ));

    // Neither record was overwritten by the rejected end.
    let after = harness.dispatch.rides.ride(ride.id).await.expect("ride");
    assert_eq!(after.status, RideStatus::Cancelled);
    let trip_after = harness.dispatch.trips.trip(trip.id).await.expect("trip");
    assert_eq!(trip_after.status, TripStatus::Started);
    assert!(trip_after.total_fare.is_none());
}

#[tokio::test]
async fn trip_lookup_by_ride_finds_the_trip() {
    let harness = build_dispatch(DispatchConfig::default(), StubGateway::approving());
    let (ride, _driver) = matched_and_accepted(&harness).await;
    let trip = harness
        .dispatch
        .trips
        .start_trip(ride.id)
        .await
        .expect("start");

    let found = harness
        .dispatch
        .trips
        .trip_by_ride(ride.id)
        .await
        .expect("lookup");
    assert_eq!(found.id, trip.id);

    let err = harness
        .dispatch
        .trips
        .trip_by_ride(Uuid::new_v4())
        .await
        .expect_err("unknown ride has no trip");
    assert!(matches!(err, DispatchError::TripNotFoundForRide(_)));
}
