use std::{collections::HashSet, fmt, str::FromStr};

use serde::Serialize;
use thiserror::Error;

use crate::error::LootError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemParseError {
    #[error("item descriptor is empty")]
    Empty,
    #[error("'{0}' is not a valid material id")]
    InvalidMaterial(String),
    #[error("unterminated modifier block in '{0}'")]
    Unterminated(String),
    #[error("unsupported modifier '{0}'")]
    UnsupportedModifier(String),
    #[error("unknown potion kind '{0}'")]
    UnknownPotion(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PotionKind {
    Regeneration,
    Swiftness,
    Strength,
    Healing,
}

impl FromStr for PotionKind {
    type Err = ItemParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regeneration" => Ok(PotionKind::Regeneration),
            "swiftness" => Ok(PotionKind::Swiftness),
            "strength" => Ok(PotionKind::Strength),
            "healing" => Ok(PotionKind::Healing),
            other => Err(ItemParseError::UnknownPotion(other.to_string())),
        }
    }
}

impl fmt::Display for PotionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PotionKind::Regeneration => "regeneration",
            PotionKind::Swiftness => "swiftness",
            PotionKind::Strength => "strength",
            PotionKind::Healing => "healing",
        };
        f.write_str(name)
    }
}

/// Item descriptor, parsed once when configuration loads.
///
/// Accepted forms are a bare material (`iron_sword`) or a material with a
/// potion block (`splash_potion{Potion:regeneration2}`). A trailing `2` marks
/// the upgraded potion, a trailing `1` or no digit the base level.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemSpec {
    Simple {
        material: String,
    },
    Potion {
        material: String,
        potion: PotionKind,
        level: u8,
        upgraded: bool,
    },
}

impl ItemSpec {
    pub fn simple(material: &str) -> Result<Self, ItemParseError> {
        Ok(ItemSpec::Simple {
            material: normalize_material(material)?,
        })
    }

    pub fn material(&self) -> &str {
        match self {
            ItemSpec::Simple { material } | ItemSpec::Potion { material, .. } => material,
        }
    }
}

impl FromStr for ItemSpec {
    type Err = ItemParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some(brace) = s.find('{') else {
            return ItemSpec::simple(s);
        };
        let material = normalize_material(&s[..brace])?;
        let block = s[brace + 1..]
            .strip_suffix('}')
            .ok_or_else(|| ItemParseError::Unterminated(s.to_string()))?
            .trim();
        let Some(potion) = block.strip_prefix("Potion:") else {
            return Err(ItemParseError::UnsupportedModifier(block.to_string()));
        };
        let potion = potion.trim().to_ascii_lowercase();
        let (name, level) = match potion.strip_suffix('2') {
            Some(name) => (name, 2),
            None => (potion.strip_suffix('1').unwrap_or(&potion), 1),
        };
        Ok(ItemSpec::Potion {
            material,
            potion: name.parse()?,
            level,
            upgraded: level >= 2,
        })
    }
}

impl fmt::Display for ItemSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemSpec::Simple { material } => f.write_str(material),
            ItemSpec::Potion {
                material,
                potion,
                level,
                ..
            } => write!(f, "{material}{{Potion:{potion}{level}}}"),
        }
    }
}

fn normalize_material(raw: &str) -> Result<String, ItemParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ItemParseError::Empty);
    }
    if !raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ItemParseError::InvalidMaterial(raw.to_string()));
    }
    Ok(raw.to_ascii_uppercase())
}

/// Enchantment names are matched case-insensitively and stored lowercase.
pub fn normalize_enchantment(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

/// One weighted option of a loot list. The weight itself lives in the
/// surrounding [`WeightedTable`](super::WeightedTable).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LootEntry {
    pub item: ItemSpec,
    pub amount: u32,
    pub enchantments: Vec<(String, u32)>,
}

impl LootEntry {
    pub fn new(item: ItemSpec, amount: u32) -> Self {
        Self {
            item,
            amount,
            enchantments: Vec::new(),
        }
    }

    pub fn with_enchantment(mut self, name: &str, level: u32) -> Self {
        self.enchantments.push((normalize_enchantment(name), level));
        self
    }

    /// Resolves the entry against the registry into a concrete stack.
    pub fn materialize(&self, registry: &ItemRegistry) -> Result<ItemStack, LootError> {
        if !registry.knows_material(self.item.material()) {
            return Err(LootError::UnknownItem(self.item.to_string()));
        }
        if let Some((name, _)) = self
            .enchantments
            .iter()
            .find(|(name, _)| !registry.knows_enchantment(name))
        {
            return Err(LootError::UnknownEnchantment(name.clone()));
        }
        Ok(ItemStack {
            item: self.item.clone(),
            amount: self.amount,
            enchantments: self.enchantments.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemStack {
    pub item: ItemSpec,
    pub amount: u32,
    pub enchantments: Vec<(String, u32)>,
}

/// Known materials and enchantments. A missing list accepts every id.
#[derive(Debug, Clone, Default)]
pub struct ItemRegistry {
    materials: Option<HashSet<String>>,
    enchantments: Option<HashSet<String>>,
}

impl ItemRegistry {
    pub fn open() -> Self {
        Self::default()
    }

    pub fn with_materials<'a>(mut self, materials: impl IntoIterator<Item = &'a str>) -> Self {
        self.materials = Some(
            materials
                .into_iter()
                .map(|m| m.trim().to_ascii_uppercase())
                .collect(),
        );
        self
    }

    pub fn with_enchantments<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        self.enchantments = Some(names.into_iter().map(normalize_enchantment).collect());
        self
    }

    pub fn knows_material(&self, material: &str) -> bool {
        self.materials
            .as_ref()
            .map_or(true, |known| known.contains(material))
    }

    pub fn knows_enchantment(&self, name: &str) -> bool {
        self.enchantments
            .as_ref()
            .map_or(true, |known| known.contains(name))
    }
}
