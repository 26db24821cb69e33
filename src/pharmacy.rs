//! Pharmacy directory and medicine availability (sample catalogue).

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Pharmacy {
    pub id: &'static str,
    pub name: &'static str,
    pub address: &'static str,
    pub phone: &'static str,
    pub distance: &'static str,
    pub rating: f32,
    pub is_open: bool,
    pub open_hours: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stock {
    pub pharmacy_id: &'static str,
    pub in_stock: bool,
    pub price: &'static str,
    pub quantity: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct Medicine {
    pub id: &'static str,
    pub name: &'static str,
    pub generic_name: &'static str,
    pub category: &'static str,
    pub availability: &'static [Stock],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityStatus {
    Available,
    Limited,
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct MedicineAvailability {
    #[serde(flatten)]
    pub medicine: Medicine,
    pub status: AvailabilityStatus,
    pub in_stock_count: usize,
}

const fn stock(
    pharmacy_id: &'static str,
    in_stock: bool,
    price: &'static str,
    quantity: &'static str,
) -> Stock {
    Stock {
        pharmacy_id,
        in_stock,
        price,
        quantity,
    }
}

pub const PHARMACIES: &[Pharmacy] = &[
    Pharmacy {
        id: "1",
        name: "Nabha Medical Store",
        address: "Main Market, Nabha",
        phone: "+91 98765 12345",
        distance: "0.5 km",
        rating: 4.5,
        is_open: true,
        open_hours: "8:00 AM - 10:00 PM",
    },
    Pharmacy {
        id: "2",
        name: "City Pharmacy",
        address: "Civil Hospital Road, Nabha",
        phone: "+91 98765 67890",
        distance: "1.2 km",
        rating: 4.2,
        is_open: true,
        open_hours: "9:00 AM - 9:00 PM",
    },
    Pharmacy {
        id: "3",
        name: "Health Plus Pharmacy",
        address: "Bus Stand, Nabha",
        phone: "+91 98765 54321",
        distance: "2.1 km",
        rating: 4.0,
        is_open: false,
        open_hours: "8:00 AM - 8:00 PM",
    },
    Pharmacy {
        id: "4",
        name: "Wellness Pharmacy",
        address: "Patiala Road, Nabha",
        phone: "+91 98765 98765",
        distance: "3.5 km",
        rating: 4.3,
        is_open: true,
        open_hours: "24 Hours",
    },
];

pub const MEDICINES: &[Medicine] = &[
    Medicine {
        id: "1",
        name: "Paracetamol 500mg",
        generic_name: "Acetaminophen",
        category: "Pain Relief",
        availability: &[
            stock("1", true, "₹25", "50+ tablets"),
            stock("2", true, "₹22", "30+ tablets"),
            stock("3", false, "₹24", "Out of stock"),
            stock("4", true, "₹26", "100+ tablets"),
        ],
    },
    Medicine {
        id: "2",
        name: "Amlodipine 5mg",
        generic_name: "Amlodipine Besylate",
        category: "Blood Pressure",
        availability: &[
            stock("1", true, "₹45", "20+ tablets"),
            stock("2", false, "₹42", "Out of stock"),
            stock("3", true, "₹44", "15+ tablets"),
            stock("4", true, "₹46", "40+ tablets"),
        ],
    },
    Medicine {
        id: "3",
        name: "Cough Syrup",
        generic_name: "Dextromethorphan",
        category: "Respiratory",
        availability: &[
            stock("1", true, "₹85", "10+ bottles"),
            stock("2", true, "₹82", "8+ bottles"),
            stock("3", false, "₹84", "Out of stock"),
            stock("4", true, "₹87", "25+ bottles"),
        ],
    },
    Medicine {
        id: "4",
        name: "Vitamin D3 1000 IU",
        generic_name: "Cholecalciferol",
        category: "Vitamins",
        availability: &[
            stock("1", true, "₹120", "30+ capsules"),
            stock("2", true, "₹115", "25+ capsules"),
            stock("3", true, "₹118", "20+ capsules"),
            stock("4", false, "₹122", "Out of stock"),
        ],
    },
    Medicine {
        id: "5",
        name: "Insulin Glargine",
        generic_name: "Long-acting Insulin",
        category: "Diabetes",
        availability: &[
            stock("1", false, "₹850", "Out of stock"),
            stock("2", true, "₹820", "5+ vials"),
            stock("3", false, "₹840", "Out of stock"),
            stock("4", true, "₹860", "8+ vials"),
        ],
    },
];

pub fn availability_status(medicine: &Medicine) -> AvailabilityStatus {
    match medicine.availability.iter().filter(|s| s.in_stock).count() {
        0 => AvailabilityStatus::Unavailable,
        1..=2 => AvailabilityStatus::Limited,
        _ => AvailabilityStatus::Available,
    }
}

/// Case-insensitive substring match on name, generic name or category.
/// A blank term returns the whole catalogue.
pub fn search_medicines(term: &str) -> Vec<MedicineAvailability> {
    let term = term.trim().to_lowercase();
    MEDICINES
        .iter()
        .filter(|m| {
            term.is_empty()
                || [m.name, m.generic_name, m.category]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&term))
        })
        .map(|m| MedicineAvailability {
            medicine: m.clone(),
            status: availability_status(m),
            in_stock_count: m.availability.iter().filter(|s| s.in_stock).count(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_matches_generic_name_and_category() {
        let by_generic = search_medicines("acetaminophen");
        assert_eq!(by_generic.len(), 1);
        assert_eq!(by_generic[0].medicine.name, "Paracetamol 500mg");

        let by_category = search_medicines("  DIABETES ");
        assert_eq!(by_category.len(), 1);
        assert_eq!(by_category[0].medicine.id, "5");

        assert_eq!(search_medicines("").len(), MEDICINES.len());
        assert!(search_medicines("aspirin").is_empty());
    }

    #[test]
    fn status_follows_stock_count() {
        let statuses: Vec<_> = MEDICINES.iter().map(availability_status).collect();
        assert_eq!(
            statuses,
            vec![
                AvailabilityStatus::Available,
                AvailabilityStatus::Available,
                AvailabilityStatus::Available,
                AvailabilityStatus::Available,
                AvailabilityStatus::Limited,
            ]
        );
    }

    #[test]
    fn every_stock_entry_names_a_known_pharmacy() {
        for medicine in MEDICINES {
            for entry in medicine.availability {
                assert!(PHARMACIES.iter().any(|p| p.id == entry.pharmacy_id));
            }
        }
    }

    #[test]
    fn medicine_serializes_flat_with_status() {
        let json = serde_json::to_value(&search_medicines("insulin")[0]).unwrap();
        assert_eq!(json["status"], "limited");
        assert_eq!(json["generic_name"], "Long-acting Insulin");
        assert_eq!(json["in_stock_count"], 2);
    }
}
