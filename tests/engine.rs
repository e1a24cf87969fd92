//! Engine behavior tests against the in-memory store backend.
//!
//! These exercise the booking, inventory and rating semantics without a
//! database. The same service layer runs against Postgres in production.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use agrirent_server::config::PaginationConfig;
use agrirent_server::error::AppError;
use agrirent_server::models::booking::CreateBooking;
use agrirent_server::models::equipment::CreateEquipment;
use agrirent_server::models::rating::SubmitRating;
use agrirent_server::models::user::{CreateUser, UserRole};
use agrirent_server::models::{BookingStatus, CatalogQuery, SortField, SortOrder, User};
use agrirent_server::services::Services;
use agrirent_server::store::MemoryStore;

fn services() -> Services {
    Services::new(Arc::new(MemoryStore::new()), PaginationConfig::default())
}

async fn make_user(services: &Services, name: &str, role: UserRole) -> User {
    services
        .users
        .create(CreateUser {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            phone: None,
            avatar: None,
            role: Some(role),
        })
        .await
        .unwrap()
}

fn equipment_input(name: &str, daily: i64, weekly: i64, quantity: i32) -> CreateEquipment {
    CreateEquipment {
        name: name.to_string(),
        description: format!("{} for field work", name),
        equipment_type: None,
        manufacturer: None,
        model_year: None,
        condition: None,
        location: Some("Lyon".to_string()),
        rental_terms: None,
        daily_rent_price: Decimal::from(daily),
        weekly_rent_price: (weekly > 0).then(|| Decimal::from(weekly)),
        monthly_rent_price: None,
        total_quantity: quantity,
        images: vec![],
        owner_id: None,
    }
}

fn booking_input(equipment_id: Uuid, user_id: Uuid, quantity: i32) -> CreateBooking {
    let start = Utc::now() + Duration::days(1);
    CreateBooking {
        equipment_id,
        user_id,
        quantity,
        start_date: start,
        end_date: start + Duration::days(3),
    }
}

#[tokio::test]
async fn concurrent_bookings_never_overbook() {
    let services = services();
    let owner = make_user(&services, "owner", UserRole::Owner).await;
    let renter = make_user(&services, "renter", UserRole::Renter).await;
    let equipment = services
        .catalog
        .create(owner.id, equipment_input("tractor", 100, 0, 4))
        .await
        .unwrap();

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let services = services.clone();
            let input = booking_input(equipment.id, renter.id, 1);
            tokio::spawn(async move { services.bookings.create_booking(input).await })
        })
        .collect();

    let mut successes = 0;
    let mut out_of_stock = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::OutOfStock(_)) => out_of_stock += 1,
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(successes, 4);
    assert_eq!(out_of_stock, 1);

    let after = services.catalog.get(equipment.id).await.unwrap();
    assert_eq!(after.available_quantity, 0);
    assert!(!after.is_available);
    assert_eq!(after.total_rentals, 4);
}

#[tokio::test]
async fn cancel_round_trips_availability() {
    let services = services();
    let owner = make_user(&services, "owner", UserRole::Owner).await;
    let renter = make_user(&services, "renter", UserRole::Renter).await;
    let equipment = services
        .catalog
        .create(owner.id, equipment_input("baler", 80, 0, 3))
        .await
        .unwrap();

    let booking = services
        .bookings
        .create_booking(booking_input(equipment.id, renter.id, 2))
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(
        services.catalog.get(equipment.id).await.unwrap().available_quantity,
        1
    );

    let cancelled = services
        .bookings
        .cancel_booking(booking.id, renter.id, false)
        .await
        .unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(
        services.catalog.get(equipment.id).await.unwrap().available_quantity,
        3
    );

    // the freed units can be booked again
    services
        .bookings
        .create_booking(booking_input(equipment.id, renter.id, 3))
        .await
        .unwrap();
}

#[tokio::test]
async fn full_reserve_blocks_until_cancelled() {
    let services = services();
    let owner = make_user(&services, "owner", UserRole::Owner).await;
    let alice = make_user(&services, "alice", UserRole::Renter).await;
    let bob = make_user(&services, "bob", UserRole::Renter).await;
    let equipment = services
        .catalog
        .create(owner.id, equipment_input("harvester", 400, 0, 2))
        .await
        .unwrap();

    let booking_a = services
        .bookings
        .create_booking(booking_input(equipment.id, alice.id, 2))
        .await
        .unwrap();
    let state = services.catalog.get(equipment.id).await.unwrap();
    assert_eq!(state.available_quantity, 0);
    assert!(!state.is_available);

    let denied = services
        .bookings
        .create_booking(booking_input(equipment.id, bob.id, 1))
        .await;
    assert!(matches!(denied, Err(AppError::OutOfStock(_))));

    services
        .bookings
        .cancel_booking(booking_a.id, alice.id, false)
        .await
        .unwrap();
    let state = services.catalog.get(equipment.id).await.unwrap();
    assert_eq!(state.available_quantity, 2);
    assert!(state.is_available);

    services
        .bookings
        .create_booking(booking_input(equipment.id, bob.id, 1))
        .await
        .unwrap();
}

#[tokio::test]
async fn cancel_requires_renter_owner_or_admin() {
    let services = services();
    let owner = make_user(&services, "owner", UserRole::Owner).await;
    let renter = make_user(&services, "renter", UserRole::Renter).await;
    let stranger = make_user(&services, "stranger", UserRole::Renter).await;
    let equipment = services
        .catalog
        .create(owner.id, equipment_input("seeder", 60, 0, 1))
        .await
        .unwrap();

    let booking = services
        .bookings
        .create_booking(booking_input(equipment.id, renter.id, 1))
        .await
        .unwrap();

    let denied = services
        .bookings
        .cancel_booking(booking.id, stranger.id, false)
        .await;
    assert!(matches!(denied, Err(AppError::Forbidden(_))));

    // the equipment owner may cancel a booking against their listing
    services
        .bookings
        .cancel_booking(booking.id, owner.id, false)
        .await
        .unwrap();

    // cancelling again is an error, not a double release
    let again = services
        .bookings
        .cancel_booking(booking.id, renter.id, false)
        .await;
    assert!(matches!(again, Err(AppError::BusinessRule(_))));
    assert_eq!(
        services.catalog.get(equipment.id).await.unwrap().available_quantity,
        1
    );
}

#[tokio::test]
async fn completed_booking_cannot_be_cancelled() {
    let services = services();
    let owner = make_user(&services, "owner", UserRole::Owner).await;
    let renter = make_user(&services, "renter", UserRole::Renter).await;
    let equipment = services
        .catalog
        .create(owner.id, equipment_input("cultivator", 55, 0, 1))
        .await
        .unwrap();

    // rental period already over
    let booking = services
        .bookings
        .create_booking(CreateBooking {
            equipment_id: equipment.id,
            user_id: renter.id,
            quantity: 1,
            start_date: Utc::now() - Duration::days(5),
            end_date: Utc::now() - Duration::days(2),
        })
        .await
        .unwrap();

    let denied = services
        .bookings
        .cancel_booking(booking.id, renter.id, false)
        .await;
    assert!(matches!(denied, Err(AppError::BusinessRule(_))));

    // the rejection released nothing
    assert_eq!(
        services.catalog.get(equipment.id).await.unwrap().available_quantity,
        0
    );
}

#[tokio::test]
async fn booking_validation_rejects_bad_input() {
    let services = services();
    let owner = make_user(&services, "owner", UserRole::Owner).await;
    let renter = make_user(&services, "renter", UserRole::Renter).await;
    let equipment = services
        .catalog
        .create(owner.id, equipment_input("plough", 50, 0, 2))
        .await
        .unwrap();

    let zero_quantity = services
        .bookings
        .create_booking(booking_input(equipment.id, renter.id, 0))
        .await;
    assert!(matches!(zero_quantity, Err(AppError::Validation(_))));

    let start = Utc::now();
    let inverted_range = services
        .bookings
        .create_booking(CreateBooking {
            equipment_id: equipment.id,
            user_id: renter.id,
            quantity: 1,
            start_date: start,
            end_date: start - Duration::days(1),
        })
        .await;
    assert!(matches!(inverted_range, Err(AppError::Validation(_))));

    let unknown_user = services
        .bookings
        .create_booking(booking_input(equipment.id, Uuid::new_v4(), 1))
        .await;
    assert!(matches!(unknown_user, Err(AppError::NotFound(_))));

    let unknown_equipment = services
        .bookings
        .create_booking(booking_input(Uuid::new_v4(), renter.id, 1))
        .await;
    assert!(matches!(unknown_equipment, Err(AppError::NotFound(_))));

    // nothing was reserved by the failed attempts
    assert_eq!(
        services.catalog.get(equipment.id).await.unwrap().available_quantity,
        2
    );
}

#[tokio::test]
async fn rating_mean_tracks_scored_submissions_only() {
    let services = services();
    let owner = make_user(&services, "owner", UserRole::Owner).await;
    let alice = make_user(&services, "alice", UserRole::Renter).await;
    let bob = make_user(&services, "bob", UserRole::Renter).await;
    let carol = make_user(&services, "carol", UserRole::Renter).await;
    let equipment = services
        .catalog
        .create(owner.id, equipment_input("sprayer", 40, 0, 1))
        .await
        .unwrap();

    services
        .ratings
        .submit(SubmitRating {
            equipment_id: equipment.id,
            user_id: alice.id,
            score: 4.0,
            review: String::new(),
        })
        .await
        .unwrap();
    services
        .ratings
        .submit(SubmitRating {
            equipment_id: equipment.id,
            user_id: bob.id,
            score: 5.0,
            review: "Solid machine".to_string(),
        })
        .await
        .unwrap();

    let state = services.catalog.get(equipment.id).await.unwrap();
    assert_eq!(state.rating_mean, 4.5);
    assert_eq!(state.rating_count, 2);

    // review-only submission is stored but leaves the aggregate untouched
    services
        .ratings
        .submit(SubmitRating {
            equipment_id: equipment.id,
            user_id: carol.id,
            score: 0.0,
            review: "Pickup was easy".to_string(),
        })
        .await
        .unwrap();

    let state = services.catalog.get(equipment.id).await.unwrap();
    assert_eq!(state.rating_mean, 4.5);
    assert_eq!(state.rating_count, 2);

    let ratings = services.ratings.list(equipment.id, 10).await.unwrap();
    assert_eq!(ratings.len(), 3);
    // newest first
    assert_eq!(ratings[0].user_id, carol.id);
    assert!(!ratings[0].has_score());
}

#[tokio::test]
async fn one_rating_per_user_per_equipment() {
    let services = services();
    let owner = make_user(&services, "owner", UserRole::Owner).await;
    let renter = make_user(&services, "renter", UserRole::Renter).await;
    let equipment = services
        .catalog
        .create(owner.id, equipment_input("mower", 30, 0, 1))
        .await
        .unwrap();

    let submit = |score: f64| SubmitRating {
        equipment_id: equipment.id,
        user_id: renter.id,
        score,
        review: String::new(),
    };

    services.ratings.submit(submit(3.0)).await.unwrap();
    let duplicate = services.ratings.submit(submit(5.0)).await;
    assert!(matches!(duplicate, Err(AppError::DuplicateRating(_))));

    let state = services.catalog.get(equipment.id).await.unwrap();
    assert_eq!(state.rating_mean, 3.0);
    assert_eq!(state.rating_count, 1);

    assert!(services
        .ratings
        .given(renter.id, equipment.id)
        .await
        .unwrap()
        .is_some());
    assert!(services
        .ratings
        .given(owner.id, equipment.id)
        .await
        .unwrap()
        .is_none());

    // unknown equipment reads as not rated, not as an error
    assert!(services
        .ratings
        .given(renter.id, Uuid::new_v4())
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn concurrent_duplicate_ratings_admit_exactly_one() {
    let services = services();
    let owner = make_user(&services, "owner", UserRole::Owner).await;
    let renter = make_user(&services, "renter", UserRole::Renter).await;
    let equipment = services
        .catalog
        .create(owner.id, equipment_input("tedder", 20, 0, 1))
        .await
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let services = services.clone();
            let input = SubmitRating {
                equipment_id: equipment.id,
                user_id: renter.id,
                score: (i + 1) as f64,
                review: String::new(),
            };
            tokio::spawn(async move { services.ratings.submit(input).await })
        })
        .collect();

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(
        services.catalog.get(equipment.id).await.unwrap().rating_count,
        1
    );
}

#[tokio::test]
async fn rating_validation() {
    let services = services();
    let owner = make_user(&services, "owner", UserRole::Owner).await;
    let renter = make_user(&services, "renter", UserRole::Renter).await;
    let equipment = services
        .catalog
        .create(owner.id, equipment_input("loader", 90, 0, 1))
        .await
        .unwrap();

    let empty = services
        .ratings
        .submit(SubmitRating {
            equipment_id: equipment.id,
            user_id: renter.id,
            score: 0.0,
            review: "   ".to_string(),
        })
        .await;
    assert!(matches!(empty, Err(AppError::Validation(_))));

    let out_of_range = services
        .ratings
        .submit(SubmitRating {
            equipment_id: equipment.id,
            user_id: renter.id,
            score: 6.0,
            review: String::new(),
        })
        .await;
    assert!(matches!(out_of_range, Err(AppError::Validation(_))));

    let unknown_equipment = services
        .ratings
        .submit(SubmitRating {
            equipment_id: Uuid::new_v4(),
            user_id: renter.id,
            score: 4.0,
            review: String::new(),
        })
        .await;
    assert!(matches!(unknown_equipment, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn catalog_filters_sorts_and_paginates() {
    let services = services();
    let owner = make_user(&services, "owner", UserRole::Owner).await;

    // weekly 500 on a 100/day item undercuts 7 dailies; 700 does not
    let cheap = services
        .catalog
        .create(owner.id, equipment_input("compact tractor", 100, 500, 1))
        .await
        .unwrap();
    let full_price = services
        .catalog
        .create(owner.id, equipment_input("large tractor", 300, 2100, 1))
        .await
        .unwrap();
    let harvester = services
        .catalog
        .create(owner.id, equipment_input("combine harvester", 900, 0, 1))
        .await
        .unwrap();

    // substring search on name
    let (found, _) = services
        .catalog
        .list(CatalogQuery {
            search_term: Some("TRACTOR".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
    assert!(found.iter().all(|e| e.name.contains("tractor")));

    // offer filter keeps only discounted listings
    let (offers, _) = services
        .catalog
        .list(CatalogQuery {
            offer: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].id, cheap.id);

    // price sort ascending
    let (sorted, _) = services
        .catalog
        .list(CatalogQuery {
            sort: Some(SortField::DailyRentPrice),
            order: Some(SortOrder::Asc),
            ..Default::default()
        })
        .await
        .unwrap();
    let ids: Vec<_> = sorted.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![cheap.id, full_price.id, harvester.id]);

    // pagination with explicit has_more
    let (page1, has_more) = services
        .catalog
        .list(CatalogQuery {
            sort: Some(SortField::DailyRentPrice),
            order: Some(SortOrder::Asc),
            limit: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page1.len(), 2);
    assert!(has_more);

    let (page2, has_more) = services
        .catalog
        .list(CatalogQuery {
            sort: Some(SortField::DailyRentPrice),
            order: Some(SortOrder::Asc),
            start_index: Some(2),
            limit: Some(2),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(page2.len(), 1);
    assert!(!has_more);
    assert_eq!(page2[0].id, harvester.id);
}

#[tokio::test]
async fn archived_equipment_leaves_catalog_and_rejects_bookings() {
    let services = services();
    let owner = make_user(&services, "owner", UserRole::Owner).await;
    let renter = make_user(&services, "renter", UserRole::Renter).await;
    let equipment = services
        .catalog
        .create(owner.id, equipment_input("swather", 70, 0, 2))
        .await
        .unwrap();

    let booking = services
        .bookings
        .create_booking(booking_input(equipment.id, renter.id, 1))
        .await
        .unwrap();

    services
        .catalog
        .archive(equipment.id, owner.id, false)
        .await
        .unwrap();

    let (listed, _) = services.catalog.list(CatalogQuery::default()).await.unwrap();
    assert!(listed.iter().all(|e| e.id != equipment.id));

    let denied = services
        .bookings
        .create_booking(booking_input(equipment.id, renter.id, 1))
        .await;
    assert!(matches!(denied, Err(AppError::NotFound(_))));

    // the existing booking still resolves and can be cancelled
    services
        .bookings
        .cancel_booking(booking.id, renter.id, false)
        .await
        .unwrap();
}

#[tokio::test]
async fn quantity_resize_shifts_availability() {
    let services = services();
    let owner = make_user(&services, "owner", UserRole::Owner).await;
    let renter = make_user(&services, "renter", UserRole::Renter).await;
    let equipment = services
        .catalog
        .create(owner.id, equipment_input("drill", 120, 0, 3))
        .await
        .unwrap();

    services
        .bookings
        .create_booking(booking_input(equipment.id, renter.id, 2))
        .await
        .unwrap();

    let grown = services
        .catalog
        .update(
            equipment.id,
            owner.id,
            false,
            agrirent_server::models::equipment::UpdateEquipment {
                total_quantity: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(grown.total_quantity, 5);
    assert_eq!(grown.available_quantity, 3);

    let shrunk = services
        .catalog
        .update(
            equipment.id,
            owner.id,
            false,
            agrirent_server::models::equipment::UpdateEquipment {
                total_quantity: Some(2),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(shrunk.total_quantity, 2);
    assert_eq!(shrunk.available_quantity, 0);
}

#[tokio::test]
async fn booking_listings_join_equipment_and_renter() {
    let services = services();
    let owner = make_user(&services, "owner", UserRole::Owner).await;
    let alice = make_user(&services, "alice", UserRole::Renter).await;
    let bob = make_user(&services, "bob", UserRole::Renter).await;
    let tractor = services
        .catalog
        .create(owner.id, equipment_input("tractor", 100, 0, 2))
        .await
        .unwrap();

    let alice_booking = services
        .bookings
        .create_booking(booking_input(tractor.id, alice.id, 1))
        .await
        .unwrap();
    services
        .bookings
        .create_booking(booking_input(tractor.id, bob.id, 1))
        .await
        .unwrap();

    let mine = services
        .bookings
        .list_for_user(Some(alice.id), None)
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].user.id, alice.id);
    assert_eq!(mine[0].equipment.name, "tractor");

    // admin all-bookings view, filtered by the renter's name
    let filtered = services
        .bookings
        .list_for_user(None, Some("ALICE"))
        .await
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].user.username, "alice");

    let requests = services
        .bookings
        .list_requests_for_owner(owner.id)
        .await
        .unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|b| b.equipment.owner_id == owner.id));

    // cancelled bookings drop out of the owner's request list but stay in
    // the renter's own history
    services
        .bookings
        .cancel_booking(alice_booking.id, alice.id, false)
        .await
        .unwrap();
    let requests = services
        .bookings
        .list_requests_for_owner(owner.id)
        .await
        .unwrap();
    assert_eq!(requests.len(), 1);
    let mine = services
        .bookings
        .list_for_user(Some(alice.id), None)
        .await
        .unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].status, BookingStatus::Cancelled);
}
