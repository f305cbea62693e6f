use crate::error::AvatarError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Option group of the avatar configurator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarKind {
    Hair,
    HairColor,
    SkinColor,
    FacialHair,
    Clothing,
}

impl fmt::Display for AvatarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Hair => "hair",
            Self::HairColor => "hair color",
            Self::SkinColor => "skin color",
            Self::FacialHair => "facial hair",
            Self::Clothing => "clothing",
        };
        f.write_str(name)
    }
}

/// A selectable option: the id sent to the service and a display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarOption {
    pub id: String,
    pub name: String,
}

impl AvatarOption {
    fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
        }
    }
}

/// Options offered by the avatar configurator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarCatalog {
    pub hair_configurations: Vec<AvatarOption>,
    pub hair_colors: Vec<AvatarOption>,
    pub skin_colors: Vec<AvatarOption>,
    pub facial_hair_configurations: Vec<AvatarOption>,
    pub clothings: Vec<AvatarOption>,
}

impl Default for AvatarCatalog {
    fn default() -> Self {
        Self {
            hair_configurations: vec![
                AvatarOption::new("big_hair", "Voluminöses Haar"),
                AvatarOption::new("bob", "Bob"),
                AvatarOption::new("curly", "Lockig"),
                AvatarOption::new("curvy", "Gewellt"),
                AvatarOption::new("frizzle", "Kraus"),
                AvatarOption::new("fro", "Afro"),
                AvatarOption::new("braids", "Zöpfe"),
                AvatarOption::new("buzzcut", "Bürstenschnitt"),
                AvatarOption::new("dreadlocks", "Dreadlocks"),
                AvatarOption::new("einstein_hair", "Einstein-Haar"),
            ],
            hair_colors: vec![
                AvatarOption::new("#B58143", "Blond"),
                AvatarOption::new("#724133", "Braun"),
                AvatarOption::new("#2C1B18", "Schwarz"),
            ],
            skin_colors: vec![
                AvatarOption::new("#EDB98A", "Hell"),
                AvatarOption::new("#AE5D29", "Dunkel"),
            ],
            // An empty id means no facial hair.
            facial_hair_configurations: vec![
                AvatarOption::new("", "Kein Bart"),
                AvatarOption::new("beard_light", "Leichter Bart"),
                AvatarOption::new("beard_magestic", "Majestätischer Bart"),
            ],
            clothings: vec![
                AvatarOption::new("hoodie", "Hoodie"),
                AvatarOption::new("collar_sweater", "Pullover mit Kragen"),
                AvatarOption::new("shirt_v_neck", "Shirt mit V-Ausschnitt"),
                AvatarOption::new("shirt_crew_neck", "Shirt mit Rundhalsausschnitt"),
            ],
        }
    }
}

impl AvatarCatalog {
    /// Options of one group.
    pub fn options(&self, kind: AvatarKind) -> &[AvatarOption] {
        match kind {
            AvatarKind::Hair => &self.hair_configurations,
            AvatarKind::HairColor => &self.hair_colors,
            AvatarKind::SkinColor => &self.skin_colors,
            AvatarKind::FacialHair => &self.facial_hair_configurations,
            AvatarKind::Clothing => &self.clothings,
        }
    }

    pub fn contains(&self, kind: AvatarKind, id: &str) -> bool {
        self.options(kind).iter().any(|option| option.id == id)
    }
}

/// One option id per group, as sent to the configure endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarSelection {
    pub hair_id: String,
    pub hair_color_id: String,
    pub skin_color_id: String,
    pub facial_hair_id: String,
    pub clothing_id: String,
}

impl AvatarSelection {
    /// Reject ids the catalog does not offer.
    pub fn validate(&self, catalog: &AvatarCatalog) -> Result<(), AvatarError> {
        let picks = [
            (AvatarKind::Hair, &self.hair_id),
            (AvatarKind::HairColor, &self.hair_color_id),
            (AvatarKind::SkinColor, &self.skin_color_id),
            (AvatarKind::FacialHair, &self.facial_hair_id),
            (AvatarKind::Clothing, &self.clothing_id),
        ];
        for (kind, id) in picks {
            if !catalog.contains(kind, id) {
                return Err(AvatarError::InvalidSelection {
                    kind,
                    id: id.clone(),
                });
            }
        }
        Ok(())
    }
}
