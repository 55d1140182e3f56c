use crate::catalog::fields::CategoryField;
use chrono::{Datelike, Utc};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;

/// Separator between the segments of a category slug path, e.g. `vehicules/voitures`.
pub const SLUG_SEPARATOR: char = '/';

static CATALOG: Lazy<BTreeMap<&'static str, Vec<CategoryField>>> = Lazy::new(build_catalog);

/// Resolves the dynamic attribute fields for a category slug.
///
/// Exact slug first, then the top-level segment so sub-categories inherit
/// their parent's schema. No match yields an empty slice, which simply means
/// the category carries no dynamic attributes.
pub fn resolve(category_slug: &str) -> &'static [CategoryField] {
    let slug = category_slug.trim();
    if let Some(fields) = CATALOG.get(slug) {
        return fields;
    }
    let top = slug.split(SLUG_SEPARATOR).next().unwrap_or_default();
    CATALOG.get(top).map(Vec::as_slice).unwrap_or(&[])
}

pub fn has_dynamic_fields(category_slug: &str) -> bool {
    !resolve(category_slug).is_empty()
}

pub fn catalog_slugs() -> impl Iterator<Item = &'static str> {
    CATALOG.keys().copied()
}

fn build_catalog() -> BTreeMap<&'static str, Vec<CategoryField>> {
    let next_year = f64::from(Utc::now().year() + 1);
    let mut catalog = BTreeMap::new();

    catalog.insert(
        "immobilier",
        vec![
            CategoryField::select_labeled(
                "type_bien",
                "Type de bien",
                &[
                    ("APPARTEMENT", "Appartement"),
                    ("MAISON", "Maison / Villa"),
                    ("STUDIO", "Studio"),
                    ("DUPLEX", "Duplex"),
                    ("TERRAIN", "Terrain"),
                    ("BUREAU", "Bureau"),
                    ("COMMERCE", "Local commercial"),
                    ("ENTREPOT", "Entrepôt"),
                ],
            )
            .required(),
            CategoryField::number("surface", "Surface")
                .required()
                .unit("m²")
                .min(1.0)
                .placeholder("Ex: 120"),
            CategoryField::number("pieces", "Nombre de pièces")
                .required()
                .min(1.0)
                .placeholder("Ex: 4"),
            CategoryField::number("chambres", "Chambres")
                .required()
                .min(0.0)
                .placeholder("Ex: 2"),
            CategoryField::number("salles_bain", "Salles de bain")
                .min(0.0)
                .placeholder("Ex: 1"),
            CategoryField::number("etage", "Étage").min(0.0).placeholder("Ex: 3"),
            CategoryField::boolean("meuble", "Meublé"),
            CategoryField::boolean("ascenseur", "Ascenseur"),
            CategoryField::boolean("parking", "Parking"),
            CategoryField::boolean("jardin", "Jardin"),
            CategoryField::boolean("piscine", "Piscine"),
            CategoryField::boolean("climatisation", "Climatisation"),
            CategoryField::boolean("securite", "Gardiennage/Sécurité"),
        ],
    );

    catalog.insert(
        "vehicules",
        vec![
            CategoryField::text("marque", "Marque")
                .required()
                .placeholder("Ex: Toyota"),
            CategoryField::text("modele", "Modèle")
                .required()
                .placeholder("Ex: Camry"),
            CategoryField::number("annee", "Année")
                .required()
                .min(1950.0)
                .max(next_year)
                .placeholder("Ex: 2018"),
            CategoryField::number("kilometrage", "Kilométrage")
                .required()
                .unit("km")
                .min(0.0)
                .placeholder("Ex: 85000"),
            CategoryField::select_labeled(
                "carburant",
                "Carburant",
                &[
                    ("ESSENCE", "Essence"),
                    ("DIESEL", "Diesel"),
                    ("HYBRIDE", "Hybride"),
                    ("ELECTRIQUE", "Électrique"),
                    ("GPL", "GPL"),
                ],
            )
            .required(),
            CategoryField::select_labeled(
                "transmission",
                "Transmission",
                &[
                    ("MANUELLE", "Manuelle"),
                    ("AUTOMATIQUE", "Automatique"),
                    ("SEMI_AUTO", "Semi-automatique"),
                ],
            )
            .required(),
            CategoryField::text("couleur", "Couleur").placeholder("Ex: Noir"),
            CategoryField::number("nombre_portes", "Nombre de portes")
                .min(2.0)
                .max(5.0),
            CategoryField::number("nombre_places", "Nombre de places")
                .min(2.0)
                .max(9.0),
            CategoryField::boolean("climatisation", "Climatisation"),
            CategoryField::boolean("premiere_main", "Première main"),
            CategoryField::boolean("visite_technique", "Visite technique à jour")
                .description("Contrôle technique valide à la date de publication"),
            CategoryField::boolean("assurance", "Assurance à jour"),
        ],
    );

    catalog.insert(
        "electronique",
        vec![
            CategoryField::text("marque", "Marque")
                .required()
                .placeholder("Ex: Samsung"),
            CategoryField::text("modele", "Modèle").placeholder("Ex: Galaxy S21"),
            CategoryField::select(
                "stockage",
                "Stockage",
                &[
                    "16 Go", "32 Go", "64 Go", "128 Go", "256 Go", "512 Go", "1 To", "2 To",
                ],
            ),
            CategoryField::select(
                "ram",
                "RAM",
                &[
                    "2 Go", "4 Go", "6 Go", "8 Go", "12 Go", "16 Go", "32 Go", "64 Go",
                ],
            ),
            CategoryField::text("couleur", "Couleur").placeholder("Ex: Noir"),
            CategoryField::boolean("garantie", "Sous garantie"),
            CategoryField::number("duree_garantie", "Durée garantie restante")
                .unit("mois")
                .min(0.0),
            CategoryField::textarea("accessoires_inclus", "Accessoires inclus")
                .placeholder("Ex: Chargeur, écouteurs, étui..."),
        ],
    );

    catalog.insert(
        "electromenager",
        vec![
            CategoryField::text("marque", "Marque")
                .required()
                .placeholder("Ex: LG"),
            CategoryField::text("modele", "Modèle").placeholder("Ex: GR-X257"),
            CategoryField::text("capacite", "Capacité").placeholder("Ex: 350L, 7kg, etc."),
            CategoryField::select(
                "consommation",
                "Classe énergétique",
                &["A+++", "A++", "A+", "A", "B", "C", "D"],
            ),
            CategoryField::text("couleur", "Couleur").placeholder("Ex: Blanc"),
            CategoryField::boolean("garantie", "Sous garantie"),
            CategoryField::number("duree_garantie", "Durée garantie restante")
                .unit("mois")
                .min(0.0),
            CategoryField::boolean("facture_disponible", "Facture disponible"),
        ],
    );

    catalog.insert(
        "emploi-services",
        vec![
            CategoryField::select_labeled(
                "type_contrat",
                "Type de contrat",
                &[
                    ("CDI", "CDI - Contrat à Durée Indéterminée"),
                    ("CDD", "CDD - Contrat à Durée Déterminée"),
                    ("STAGE", "Stage"),
                    ("FREELANCE", "Freelance / Indépendant"),
                    ("INTERIM", "Intérim"),
                    ("APPRENTISSAGE", "Apprentissage"),
                ],
            ),
            CategoryField::number("experience_requise", "Expérience requise")
                .unit("années")
                .min(0.0)
                .placeholder("Ex: 3"),
            CategoryField::select_labeled(
                "niveau_etude",
                "Niveau d'études",
                &[
                    ("AUCUN", "Aucun diplôme requis"),
                    ("BEPC", "BEPC"),
                    ("BAC", "Baccalauréat"),
                    ("BAC_2", "Bac+2 (BTS, DUT)"),
                    ("BAC_3", "Bac+3 (Licence)"),
                    ("BAC_5", "Bac+5 (Master)"),
                    ("DOCTORAT", "Doctorat"),
                ],
            ),
            CategoryField::number("salaire_min", "Salaire minimum")
                .unit("FCFA")
                .min(0.0)
                .placeholder("Ex: 150000"),
            CategoryField::number("salaire_max", "Salaire maximum")
                .unit("FCFA")
                .min(0.0)
                .placeholder("Ex: 300000"),
            CategoryField::boolean("teletravail", "Télétravail possible"),
            CategoryField::text("secteur", "Secteur d'activité")
                .placeholder("Ex: Informatique, Commerce, etc."),
            CategoryField::textarea("competences", "Compétences requises")
                .placeholder("Listez les compétences nécessaires..."),
        ],
    );

    catalog.insert(
        "mode-beaute",
        vec![
            CategoryField::text("marque", "Marque").placeholder("Ex: Nike"),
            CategoryField::select(
                "taille",
                "Taille",
                &[
                    "XS", "S", "M", "L", "XL", "XXL", "XXXL", "36", "37", "38", "39", "40", "41",
                    "42", "43", "44", "45", "46",
                ],
            ),
            CategoryField::text("couleur", "Couleur").placeholder("Ex: Bleu"),
            CategoryField::text("matiere", "Matière").placeholder("Ex: Coton, Cuir, etc."),
            CategoryField::select_labeled(
                "genre",
                "Genre",
                &[
                    ("HOMME", "Homme"),
                    ("FEMME", "Femme"),
                    ("ENFANT", "Enfant"),
                    ("UNISEXE", "Unisexe"),
                ],
            ),
            CategoryField::boolean("etiquette_presente", "Étiquette présente"),
        ],
    );

    catalog.insert(
        "maison-jardin",
        vec![
            CategoryField::text("marque", "Marque").placeholder("Ex: IKEA"),
            CategoryField::text("dimensions", "Dimensions").placeholder("Ex: 200x150x80 cm"),
            CategoryField::text("couleur", "Couleur").placeholder("Ex: Beige"),
            CategoryField::text("matiere", "Matière").placeholder("Ex: Bois, Tissu, Métal..."),
            CategoryField::boolean("livraison_possible", "Livraison possible"),
            CategoryField::boolean("montage_possible", "Montage possible"),
        ],
    );

    catalog.insert(
        "animaux",
        vec![
            CategoryField::text("race", "Race").placeholder("Ex: Berger Allemand"),
            CategoryField::number("age", "Âge")
                .unit("mois")
                .min(0.0)
                .placeholder("Ex: 6"),
            CategoryField::select_labeled(
                "sexe",
                "Sexe",
                &[("MALE", "Mâle"), ("FEMELLE", "Femelle")],
            ),
            CategoryField::boolean("vaccine", "Vacciné"),
            CategoryField::boolean("puce", "Pucé"),
            CategoryField::boolean("pedigree", "Pedigree"),
            CategoryField::boolean("sterilise", "Stérilisé"),
        ],
    );

    catalog.insert(
        "agriculture",
        vec![
            CategoryField::select_labeled(
                "type_produit",
                "Type de produit",
                &[
                    ("MATERIEL", "Matériel agricole"),
                    ("SEMENCE", "Semences"),
                    ("PLANT", "Plants"),
                    ("ANIMAL", "Animal"),
                    ("PRODUIT", "Produit agricole"),
                ],
            ),
            CategoryField::text("marque", "Marque").placeholder("Ex: John Deere"),
            CategoryField::number("annee", "Année")
                .min(1950.0)
                .placeholder("Ex: 2015"),
            CategoryField::number("heures_utilisation", "Heures d'utilisation")
                .unit("heures")
                .min(0.0),
            CategoryField::number("quantite", "Quantité disponible")
                .min(1.0)
                .placeholder("Ex: 100"),
            CategoryField::select(
                "unite",
                "Unité",
                &["kg", "tonnes", "litres", "sacs", "unités", "hectares"],
            ),
        ],
    );

    catalog.insert(
        "construction-materiaux",
        vec![
            CategoryField::text("type_materiau", "Type de matériau")
                .required()
                .placeholder("Ex: Ciment, Fer, Bois..."),
            CategoryField::text("marque", "Marque").placeholder("Ex: Cimencam"),
            CategoryField::number("quantite", "Quantité disponible")
                .min(1.0)
                .placeholder("Ex: 50"),
            CategoryField::select(
                "unite",
                "Unité",
                &["sacs", "tonnes", "mètres", "m²", "m³", "pièces", "cartons"],
            ),
            CategoryField::text("dimensions", "Dimensions").placeholder("Ex: 2.5m x 1.2m"),
            CategoryField::boolean("livraison_possible", "Livraison possible"),
        ],
    );

    catalog.insert(
        "energie-environnement",
        vec![
            CategoryField::select_labeled(
                "type_equipement",
                "Type d'équipement",
                &[
                    ("PANNEAU_SOLAIRE", "Panneau solaire"),
                    ("GENERATEUR", "Générateur"),
                    ("BATTERIE", "Batterie"),
                    ("ONDULEUR", "Onduleur"),
                    ("EOLIENNE", "Éolienne"),
                ],
            )
            .required(),
            CategoryField::text("marque", "Marque").placeholder("Ex: Victron"),
            CategoryField::number("puissance", "Puissance")
                .unit("W/kW")
                .min(0.0)
                .placeholder("Ex: 5000"),
            CategoryField::text("capacite", "Capacité").placeholder("Ex: 200Ah, 10kWh"),
            CategoryField::boolean("garantie", "Sous garantie"),
            CategoryField::boolean("installation_incluse", "Installation incluse"),
        ],
    );

    catalog.insert(
        "education-formation",
        vec![
            CategoryField::select_labeled(
                "type_formation",
                "Type de formation",
                &[
                    ("COURS_PARTICULIER", "Cours particulier"),
                    ("FORMATION_PRO", "Formation professionnelle"),
                    ("COURS_LIGNE", "Cours en ligne"),
                    ("ATELIER", "Atelier"),
                ],
            ),
            CategoryField::text("matiere", "Matière / Domaine")
                .required()
                .placeholder("Ex: Mathématiques, Informatique..."),
            CategoryField::select(
                "niveau",
                "Niveau",
                &[
                    "Primaire",
                    "Collège",
                    "Lycée",
                    "Université",
                    "Professionnel",
                    "Tous niveaux",
                ],
            ),
            CategoryField::text("duree", "Durée").placeholder("Ex: 3 mois, 20 heures..."),
            CategoryField::boolean("certificat", "Certificat délivré"),
            CategoryField::boolean("en_ligne", "Formation en ligne"),
        ],
    );

    catalog
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fields::FieldType;
    use serde_json::json;

    #[test]
    fn resolve_is_stable_across_calls() {
        for slug in catalog_slugs().chain(["inconnu", "", "vehicules/motos"]) {
            let first = resolve(slug);
            let second = resolve(slug);
            assert_eq!(first, second);
            if !first.is_empty() {
                assert!(std::ptr::eq(first, second));
            }
        }
    }

    #[test]
    fn vehicles_declare_brand_and_bounded_year() {
        let fields = resolve("vehicules");
        let marque = fields.iter().find(|f| f.name == "marque").expect("marque");
        assert!(marque.required);
        assert_eq!(marque.field_type, FieldType::Text);

        let annee = fields.iter().find(|f| f.name == "annee").expect("annee");
        assert!(annee.required);
        assert_eq!(annee.field_type, FieldType::Number);
        assert_eq!(annee.min, Some(1950.0));
        assert_eq!(annee.max, Some(f64::from(Utc::now().year() + 1)));

        assert!(annee.check(Some(&json!(1800))).is_err());
        assert!(annee.check(Some(&json!(2021))).is_ok());
    }

    #[test]
    fn sub_category_inherits_parent_schema() {
        assert_eq!(resolve("immobilier/appartements"), resolve("immobilier"));
        assert!(has_dynamic_fields("immobilier/appartements"));
    }

    #[test]
    fn unknown_category_has_no_dynamic_fields() {
        assert!(resolve("divers").is_empty());
        assert!(resolve("divers/autres").is_empty());
        assert!(!has_dynamic_fields("divers"));
        assert!(!has_dynamic_fields(""));
    }

    #[test]
    fn field_names_are_unique_per_category() {
        for slug in catalog_slugs() {
            let fields = resolve(slug);
            let mut names: Vec<_> = fields.iter().map(|f| f.name).collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), fields.len(), "duplicate field in {slug}");
        }
    }
}
