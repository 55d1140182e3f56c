use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Region {
    pub name: &'static str,
    pub cities: &'static [&'static str],
}

pub const REGIONS: &[Region] = &[
    Region {
        name: "Adamaoua",
        cities: &["Ngaoundéré", "Meiganga", "Tibati"],
    },
    Region {
        name: "Centre",
        cities: &["Yaoundé", "Mbalmayo", "Obala", "Bafia"],
    },
    Region {
        name: "Est",
        cities: &["Bertoua", "Batouri", "Abong-Mbang"],
    },
    Region {
        name: "Extrême-Nord",
        cities: &["Maroua", "Kousseri", "Mokolo", "Mora"],
    },
    Region {
        name: "Littoral",
        cities: &["Douala", "Edéa", "Nkongsamba", "Loum"],
    },
    Region {
        name: "Nord",
        cities: &["Garoua", "Guider", "Poli"],
    },
    Region {
        name: "Nord-Ouest",
        cities: &["Bamenda", "Kumbo", "Ndop", "Wum"],
    },
    Region {
        name: "Ouest",
        cities: &["Bafoussam", "Dschang", "Mbouda", "Foumban"],
    },
    Region {
        name: "Sud",
        cities: &["Ebolowa", "Kribi", "Sangmélima"],
    },
    Region {
        name: "Sud-Ouest",
        cities: &["Buea", "Limbe", "Kumba", "Tiko"],
    },
];

pub fn find_region(name: &str) -> Option<&'static Region> {
    REGIONS.iter().find(|region| region.name == name)
}

/// Cities selectable for a region; empty when the region is unknown or unset.
pub fn cities_of(region: &str) -> &'static [&'static str] {
    find_region(region).map(|region| region.cities).unwrap_or(&[])
}
