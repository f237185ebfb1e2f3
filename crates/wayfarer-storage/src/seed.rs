//! Demo catalog used by `wayfarer --seed-demo` and by tests.

use chrono::NaiveDate;
use tracing::info;

use wayfarer_core::error::WayfarerError;
use wayfarer_core::types::Offer;

use crate::repository::OfferRepository;

struct DemoOffer {
    title: &'static str,
    destination: &'static str,
    country: &'static str,
    continent: &'static str,
    price: f64,
    start: (i32, u32, u32),
    end: (i32, u32, u32),
    transport: &'static str,
    accommodation: &'static str,
    includes: &'static [&'static str],
    available_months: &'static [&'static str],
    star_rating: f64,
}

const DEMO_OFFERS: &[DemoOffer] = &[
    DemoOffer {
        title: "Sharm El-Sheikh 4 Nights",
        destination: "Sharm El-Sheikh",
        country: "Egypt",
        continent: "Africa",
        price: 15000.0,
        start: (2026, 11, 1),
        end: (2026, 11, 5),
        transport: "bus",
        accommodation: "premium",
        includes: &["breakfast", "snorkeling"],
        available_months: &["2026-12"],
        star_rating: 4.0,
    },
    DemoOffer {
        title: "Luxor & Aswan Nile Cruise",
        destination: "Luxor",
        country: "Egypt",
        continent: "Africa",
        price: 18000.0,
        start: (2026, 12, 1),
        end: (2026, 12, 6),
        transport: "train",
        accommodation: "luxury",
        includes: &["full board", "guided tours"],
        available_months: &[],
        star_rating: 5.0,
    },
    DemoOffer {
        title: "Cairo Pyramids Weekend",
        destination: "Cairo",
        country: "Egypt",
        continent: "Africa",
        price: 8000.0,
        start: (2026, 10, 15),
        end: (2026, 10, 17),
        transport: "flight",
        accommodation: "standard",
        includes: &["breakfast", "museum tickets"],
        available_months: &["2026-11", "2027-01"],
        star_rating: 3.5,
    },
    DemoOffer {
        title: "Hurghada Beach Escape",
        destination: "Hurghada",
        country: "Egypt",
        continent: "Africa",
        price: 12000.0,
        start: (2026, 11, 10),
        end: (2026, 11, 13),
        transport: "flight",
        accommodation: "premium",
        includes: &["all inclusive", "diving"],
        available_months: &[],
        star_rating: 4.5,
    },
    DemoOffer {
        title: "Bali Island Retreat",
        destination: "Bali, Indonesia",
        country: "Indonesia",
        continent: "Asia",
        price: 1400.0,
        start: (2027, 2, 5),
        end: (2027, 2, 12),
        transport: "flight",
        accommodation: "luxury",
        includes: &["spa", "breakfast"],
        available_months: &["2027-03"],
        star_rating: 4.8,
    },
    DemoOffer {
        title: "Paris City Break",
        destination: "Paris, France",
        country: "France",
        continent: "Europe",
        price: 950.0,
        start: (2026, 12, 18),
        end: (2026, 12, 22),
        transport: "train",
        accommodation: "standard",
        includes: &["museum pass"],
        available_months: &[],
        star_rating: 4.1,
    },
];

fn date((y, m, d): (i32, u32, u32)) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

/// The demo offers as catalog rows (ids are assigned on insert).
pub fn demo_offers() -> Vec<Offer> {
    DEMO_OFFERS
        .iter()
        .map(|d| Offer {
            id: 0,
            title: d.title.to_string(),
            description: None,
            destination: Some(d.destination.to_string()),
            country: Some(d.country.to_string()),
            continent: Some(d.continent.to_string()),
            price: d.price,
            start_date: date(d.start),
            end_date: date(d.end),
            duration_days: None,
            transport_type: Some(d.transport.to_string()),
            accommodation_level: Some(d.accommodation.to_string()),
            includes: d.includes.iter().map(|s| s.to_string()).collect(),
            available_months: d.available_months.iter().map(|s| s.to_string()).collect(),
            star_rating: Some(d.star_rating),
            is_active: Some(true),
        })
        .collect()
}

/// Insert the demo catalog if the offers table is empty. Returns the number
/// of offers inserted.
pub fn seed_demo_catalog(repo: &OfferRepository) -> Result<usize, WayfarerError> {
    if repo.count()? > 0 {
        info!("Catalog already populated, skipping demo seed");
        return Ok(0);
    }
    let offers = demo_offers();
    for offer in &offers {
        repo.insert(offer)?;
    }
    info!(count = offers.len(), "Seeded demo catalog");
    Ok(offers.len())
}
