//! Medicinal plant knowledge base

use serde::Serialize;
use sqlx::{AnyPool, FromRow};

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PlantInfo {
    pub id: i64,
    pub plant_name: String,
    pub medicinal_values: Option<String>,
    pub preparations: Option<String>,
    pub dosage_guidance: Option<String>,
    pub created_at: String,
}

impl PlantInfo {
    /// Case-insensitive lookup by name
    pub async fn find_by_name(pool: &AnyPool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, PlantInfo>(
            r#"
            SELECT id, plant_name, medicinal_values, preparations, dosage_guidance, created_at
            FROM plant_info WHERE LOWER(plant_name) = LOWER($1)
            "#
        )
        .bind(name.trim())
        .fetch_optional(pool)
        .await
    }

    pub async fn list_names(pool: &AnyPool) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>("SELECT plant_name FROM plant_info ORDER BY plant_name")
            .fetch_all(pool)
            .await
    }
}

/// Bundled record inserted by the seeding step
pub struct SeedPlant {
    pub name: &'static str,
    pub medicinal_values: &'static str,
    pub preparations: &'static str,
    pub dosage_guidance: &'static str,
}

const CONSULTATION_NOTE: &str =
    "Note: For personalized treatment or further guidance, please book a one-on-one consultation with our doctors through the app.";

pub const SEED_PLANTS: &[SeedPlant] = &[
    SeedPlant {
        name: "Neem",
        medicinal_values: "Antibacterial, Antifungal, Antiviral, Anti-inflammatory, Antimalarial (traditional use), and Topical wound-healing properties.",
        preparations: "1. Decoction (drink): Boil 10–15 fresh neem leaves in 500 ml of water until reduced by half. Strain and allow to cool. Drink small amounts. Used traditionally for general internal cleansing and fevers.\n\
2. Topical paste: Grind fresh leaves into a paste and apply directly to the affected skin area for cuts, sores, or insect bites. Rinse after a short period if irritation occurs. Test on a small skin patch first to check for sensitivity.\n\
3. Neem oil (external use): Use commercially prepared neem oil or an infused oil for massage or scalp applications. Do not ingest pure neem oil. Useful against lice and some skin conditions; dilute before skin use.",
        dosage_guidance: "General advice: Traditional uses vary. Dosages differ by preparation. Only follow guidance from a qualified practitioner.\n\
Traditional examples:\n\
• Decoction (traditional): small cup (≈50–100 ml) once daily or as advised by an herbalist.\n\
• Topical: apply paste to area 1–2 times daily as needed.\n\
Contraindications: Avoid ingestion during pregnancy or breastfeeding. Not recommended for infants or small children without medical advice. People with liver disease or on medication should consult a doctor.\n\
Safety note: High doses or prolonged internal use can be harmful. This is educational/traditional information, not medical advice.\n",
    },
    SeedPlant {
        name: "Betle",
        medicinal_values: "Digestive aid, Antimicrobial, Anti-inflammatory, Oral hygiene benefits, and Wound healing.",
        preparations: "1. Betle leaf decoction: Boil 3–4 fresh betle leaves in 300 ml of water for 10 minutes. Strain and let cool before drinking. Used to improve digestion and reduce bad breath.\n\
2. Topical application: Crush fresh betle leaves and apply the juice to wounds or skin irritations. Traditionally used for minor cuts and fungal infections.\n\
3. Mouth rinse: Soak a few betle leaves in warm water, strain, and use as a natural mouthwash. Helps freshen breath and maintain oral hygiene.",
        dosage_guidance: "General advice: Betle is traditionally used in small amounts. Excessive use may cause irritation.\n\
Traditional examples:\n\
• Decoction: 50–100 ml once daily after meals.\n\
• Topical: apply leaf juice 1–2 times daily as needed.\n\
Contraindications: Avoid excessive chewing as it may irritate the mouth lining. Not recommended for people with mouth ulcers or at risk of oral cancer.\n\
Safety note: Safe in small quantities for traditional use. Avoid combining with tobacco or lime.\n",
    },
    SeedPlant {
        name: "sinensis",
        medicinal_values: "Rich in antioxidants, Supports heart health, Enhances metabolism, Improves mental alertness, and May lower the risk of chronic diseases.",
        preparations: "1. Green tea infusion: Steep 1 teaspoon of dried green tea leaves in hot water (80°C) for 2–3 minutes. Strain before drinking. Commonly used for general well-being and detoxification.\n\
2. Topical compress: Soak a cloth in cooled brewed green tea and apply to tired eyes or minor skin irritations. Used to reduce puffiness and soothe skin.",
        dosage_guidance: "General advice: Can be consumed daily in moderate amounts.\n\
Traditional examples:\n\
• 1–2 cups per day for general wellness.\n\
• Topical compress: 10–15 minutes on affected area.\n\
Contraindications: Avoid excessive consumption due to caffeine. Not advised for people with insomnia or stomach ulcers.\n\
Safety note: Safe for daily use in moderation. Avoid high doses of green tea extract supplements.\n",
    },
];

impl SeedPlant {
    /// Dosage text with the consultation note appended
    pub fn full_dosage_guidance(&self) -> String {
        format!("{}{}", self.dosage_guidance, CONSULTATION_NOTE)
    }
}
