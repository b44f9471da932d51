//! Weighted loot resolution: the generic resolver, item descriptors, tier
//! catalog and container filling.

mod container;
mod item;
mod tier;
mod weighted;

pub use container::{
    roll_container, BlockPos, ContainerFill, ContainerOpen, ContainerOutcome, RolledContainerSet,
    SlotPlacement,
};
pub use item::{
    normalize_enchantment, ItemParseError, ItemRegistry, ItemSpec, ItemStack, LootEntry,
    PotionKind,
};
pub use tier::{fill_count, Tier, TierCatalog};
pub use weighted::{pick, WeightedTable};
