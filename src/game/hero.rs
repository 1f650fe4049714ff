//! Hero Catalog and Ability Kits
//!
//! Every unit fills one of four role slots. A role has a base kit; picking a
//! hero renames the unit and may override its max HP, primary and special.
//! Ability behavior is a closed [`AbilityEffect`] so resolution is a single
//! exhaustive match.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// =============================================================================
// ROLES AND ARCHETYPES
// =============================================================================

/// Role slot a unit occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    Tank,
    #[serde(rename = "DPS1")]
    Dps1,
    #[serde(rename = "DPS2")]
    Dps2,
    Support,
}

impl Role {
    /// All roles in slot order.
    pub const ALL: [Role; 4] = [Role::Tank, Role::Dps1, Role::Dps2, Role::Support];

    /// 1-based slot number, shared by unit id and home tile index.
    pub fn slot(self) -> u8 {
        match self {
            Role::Tank => 1,
            Role::Dps1 => 2,
            Role::Dps2 => 3,
            Role::Support => 4,
        }
    }

    /// Display name used before heroes are applied.
    pub fn default_name(self) -> &'static str {
        match self {
            Role::Tank => "Tank",
            Role::Dps1 => "DPS1",
            Role::Dps2 => "DPS2",
            Role::Support => "Support",
        }
    }

    pub fn base_max_hp(self) -> u32 {
        base_kit(self).max_hp
    }
}

/// Hero archetype used for team validation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Archetype {
    Tank,
    #[serde(rename = "DPS")]
    Dps,
    Support,
}

// =============================================================================
// HERO CATALOG
// =============================================================================

/// Selectable heroes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeroId {
    Voodoo,
    Loadstone,
    LittleBear,
    Aimbot,
    Trickster,
    DungeonMaster,
    DeathBlossom,
}

impl HeroId {
    pub const ALL: [HeroId; 7] = [
        HeroId::Voodoo,
        HeroId::Loadstone,
        HeroId::LittleBear,
        HeroId::Aimbot,
        HeroId::Trickster,
        HeroId::DungeonMaster,
        HeroId::DeathBlossom,
    ];

    /// Resolve a catalog id such as `"little_bear"`.
    pub fn from_id(id: &str) -> Option<HeroId> {
        HeroId::ALL.into_iter().find(|h| h.id() == id)
    }

    pub fn id(self) -> &'static str {
        match self {
            HeroId::Voodoo => "voodoo",
            HeroId::Loadstone => "loadstone",
            HeroId::LittleBear => "little_bear",
            HeroId::Aimbot => "aimbot",
            HeroId::Trickster => "trickster",
            HeroId::DungeonMaster => "dungeon_master",
            HeroId::DeathBlossom => "death_blossom",
        }
    }

    /// Display name, also the key for kit overrides.
    pub fn name(self) -> &'static str {
        match self {
            HeroId::Voodoo => "Voodoo",
            HeroId::Loadstone => "Loadstone",
            HeroId::LittleBear => "Little Bear",
            HeroId::Aimbot => "Aimbot",
            HeroId::Trickster => "Trickster",
            HeroId::DungeonMaster => DUNGEON_MASTER,
            HeroId::DeathBlossom => "Death Blossom",
        }
    }

    pub fn archetype(self) -> Archetype {
        match self {
            HeroId::Voodoo | HeroId::Loadstone | HeroId::LittleBear => Archetype::Tank,
            HeroId::Aimbot | HeroId::Trickster | HeroId::DungeonMaster => Archetype::Dps,
            HeroId::DeathBlossom => Archetype::Support,
        }
    }
}

/// Display name of the hero with the saving throw and the 1D6 primary.
pub const DUNGEON_MASTER: &str = "Dungeon Master";

/// Display name of the hero whose primary needs an exact range match.
pub const AIMBOT: &str = "Aimbot";

/// Display name of the hero whose primary is renamed while transformed.
pub const LITTLE_BEAR: &str = "Little Bear";

/// Why a team pick was rejected.
pub const TEAM_RULE: &str = "Pick 1 Tank, 2 DPS, 1 Support";

/// A validated team: heroes in slot order Tank, DPS, DPS, Support.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TeamPick {
    pub slots: [HeroId; 4],
}

impl TeamPick {
    /// Validate hero ids into a team. Unknown ids are ignored; the remainder
    /// must be exactly one Tank, two DPS and one Support.
    pub fn resolve<S: AsRef<str>>(ids: &[S]) -> Option<TeamPick> {
        let heroes: Vec<HeroId> = ids.iter().filter_map(|id| HeroId::from_id(id.as_ref())).collect();
        let of = |arch: Archetype| -> Vec<HeroId> {
            heroes.iter().copied().filter(|h| h.archetype() == arch).collect()
        };
        let tanks = of(Archetype::Tank);
        let dps = of(Archetype::Dps);
        let supports = of(Archetype::Support);

        if tanks.len() != 1 || dps.len() != 2 || supports.len() != 1 {
            return None;
        }
        Some(TeamPick {
            slots: [tanks[0], dps[0], dps[1], supports[0]],
        })
    }

    /// Hero assigned to a role slot.
    pub fn hero_for(&self, role: Role) -> HeroId {
        self.slots[(role.slot() - 1) as usize]
    }
}

// =============================================================================
// CARDS
// =============================================================================

/// Every card and cost-bearing special, keyed as the client names them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardKind {
    SkillCheck,
    Cleanse,
    Siphon,
    Fireball,
    Entangle,
    IronSkin,
    Sprint,
    Dash,
    Blink,
    Scout,
    Wall,
    BlossomWall,
    Shatter,
    Teleport,
    Swap,
    #[serde(rename = "FMJ")]
    Fmj,
    VoodooDoll,
    PolarAttraction,
    HealingPetal,
    Transform,
}

impl CardKind {
    /// Energy cost. Blossom walls are paid as a Healing Petal.
    pub fn cost(self) -> u32 {
        match self {
            CardKind::SkillCheck => 3,
            CardKind::Cleanse => 3,
            CardKind::Siphon => 2,
            CardKind::Fireball => 4,
            CardKind::Entangle => 2,
            CardKind::IronSkin => 3,
            CardKind::Sprint => 2,
            CardKind::Wall => 1,
            CardKind::Shatter => 1,
            CardKind::Swap => 4,
            CardKind::Fmj => 6,
            CardKind::VoodooDoll => 3,
            CardKind::PolarAttraction => 4,
            CardKind::HealingPetal | CardKind::BlossomWall => 4,
            CardKind::Transform => 5,
            CardKind::Dash | CardKind::Blink | CardKind::Scout | CardKind::Teleport => 0,
        }
    }

    /// Wire name, also recorded as the last discard.
    pub fn as_str(self) -> &'static str {
        match self {
            CardKind::SkillCheck => "SkillCheck",
            CardKind::Cleanse => "Cleanse",
            CardKind::Siphon => "Siphon",
            CardKind::Fireball => "Fireball",
            CardKind::Entangle => "Entangle",
            CardKind::IronSkin => "IronSkin",
            CardKind::Sprint => "Sprint",
            CardKind::Dash => "Dash",
            CardKind::Blink => "Blink",
            CardKind::Scout => "Scout",
            CardKind::Wall => "Wall",
            CardKind::BlossomWall => "BlossomWall",
            CardKind::Shatter => "Shatter",
            CardKind::Teleport => "Teleport",
            CardKind::Swap => "Swap",
            CardKind::Fmj => "FMJ",
            CardKind::VoodooDoll => "VoodooDoll",
            CardKind::PolarAttraction => "PolarAttraction",
            CardKind::HealingPetal => "HealingPetal",
            CardKind::Transform => "Transform",
        }
    }
}

impl fmt::Display for CardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ABILITIES
// =============================================================================

/// What an ability does when it resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AbilityEffect {
    /// Fixed damage to an enemy, plus attack bonuses
    Damage { amount: u32 },
    /// Roll one die for damage; Skill Check adds 1
    RandomDamage { sides: u32 },
    /// Heal an ally
    Heal { amount: u32 },
    /// Damage every enemy within `radius` of the source (walls block)
    Aoe { amount: u32, radius: u32 },
    /// Exchange tiles with another unit; counts as movement
    Swap,
    /// Damage every enemy on the line to the target
    Fmj { amount: u32 },
    /// Soak teammates' damage
    Redirect { turns: u32 },
    /// Bear form: halved damage taken, +1 step, +2 damage
    Transform { turns: u32 },
    /// Pull enemies within `radius` onto open adjacent tiles
    Polar { radius: u32 },
    /// Queue an ally bonus for their next turn
    Buff { attack: u32, movement: u32 },
    /// Tile-centred healing aura
    Petal { center_heal: u32, ring_heal: u32, turns: u32 },
}

/// Static definition of a primary or special.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AbilityDef {
    pub name: &'static str,
    pub effect: AbilityEffect,
    pub range: u32,
    /// Turns before the special can be used again
    pub cooldown: u32,
    /// Card whose cost is charged
    pub cost: Option<CardKind>,
    /// Target must be exactly `range` steps away
    pub exact_range: bool,
    /// Only usable once the seat has moved this turn
    pub requires_moved: bool,
}

impl AbilityDef {
    const fn new(name: &'static str, effect: AbilityEffect, range: u32) -> Self {
        Self {
            name,
            effect,
            range,
            cooldown: 0,
            cost: None,
            exact_range: false,
            requires_moved: false,
        }
    }

    const fn cooldown(mut self, turns: u32) -> Self {
        self.cooldown = turns;
        self
    }

    const fn cost(mut self, card: CardKind) -> Self {
        self.cost = Some(card);
        self
    }

    const fn exact(mut self) -> Self {
        self.exact_range = true;
        self
    }

    const fn after_moving(mut self) -> Self {
        self.requires_moved = true;
        self
    }

    /// Energy charged for this ability.
    pub fn energy_cost(&self) -> u32 {
        self.cost.map_or(0, CardKind::cost)
    }
}

/// Max HP and both abilities of a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Kit {
    pub max_hp: u32,
    pub primary: AbilityDef,
    pub special: AbilityDef,
}

/// Base kit for a role slot.
pub fn base_kit(role: Role) -> Kit {
    use AbilityEffect::*;

    match role {
        Role::Tank => Kit {
            max_hp: 18,
            primary: AbilityDef::new("Shield Bash", Damage { amount: 3 }, 1),
            special: AbilityDef::new("Hammer Slam", Damage { amount: 5 }, 1).cooldown(3),
        },
        Role::Dps1 => Kit {
            max_hp: 8,
            primary: AbilityDef::new("Fire Bolt", Damage { amount: 3 }, 2),
            special: AbilityDef::new("Dragon's Fury", Damage { amount: 4 }, 2).cooldown(4),
        },
        Role::Dps2 => Kit {
            max_hp: 11,
            primary: AbilityDef::new("Dagger Thrust", Damage { amount: 3 }, 1),
            special: AbilityDef::new("Sneak Attack", Damage { amount: 5 }, 1)
                .cooldown(3)
                .after_moving(),
        },
        Role::Support => Kit {
            max_hp: 10,
            primary: AbilityDef::new("Mend", Heal { amount: 2 }, 2),
            special: AbilityDef::new("Healing Bloom", Heal { amount: 4 }, 2).cooldown(3),
        },
    }
}

/// Kit for a unit, applying the override for its display name if any.
pub fn kit_for(role: Role, name: &str) -> Kit {
    use AbilityEffect::*;

    let base = base_kit(role);
    match name {
        LITTLE_BEAR => Kit {
            max_hp: 13,
            primary: AbilityDef::new("Paw Swipe", Damage { amount: 3 }, 1),
            special: AbilityDef::new("Transform", Transform { turns: 3 }, 0)
                .cost(CardKind::Transform),
        },
        DUNGEON_MASTER => Kit {
            max_hp: 12,
            primary: AbilityDef::new("1D6", RandomDamage { sides: 6 }, 2),
            special: AbilityDef::new("Skill Check", Buff { attack: 1, movement: 1 }, 2)
                .cost(CardKind::SkillCheck),
        },
        "Trickster" => Kit {
            max_hp: 11,
            primary: AbilityDef::new("Sleight of Hand", Damage { amount: 4 }, 1),
            special: AbilityDef::new("Swap", Swap, 99).cost(CardKind::Swap),
        },
        AIMBOT => Kit {
            max_hp: 8,
            primary: AbilityDef::new("True Shot", Damage { amount: 5 }, 3).exact(),
            special: AbilityDef::new("FMJ", Fmj { amount: 5 }, 4).cost(CardKind::Fmj),
        },
        "Voodoo" => Kit {
            max_hp: base.max_hp,
            primary: AbilityDef::new("Pin Cushion", Damage { amount: 4 }, 1),
            special: AbilityDef::new("Voodoo Doll", Redirect { turns: 2 }, 0)
                .cost(CardKind::VoodooDoll),
        },
        "Loadstone" => Kit {
            max_hp: 15,
            primary: AbilityDef::new("Reverse Polarity", Aoe { amount: 2, radius: 1 }, 1),
            special: AbilityDef::new("Polar Attraction", Polar { radius: 2 }, 2)
                .cost(CardKind::PolarAttraction),
        },
        "Death Blossom" => Kit {
            max_hp: base.max_hp,
            primary: base.primary,
            special: AbilityDef::new(
                "Healing Petal",
                Petal { center_heal: 2, ring_heal: 1, turns: 2 },
                99,
            )
            .cost(CardKind::HealingPetal),
        },
        _ => base,
    }
}

// =============================================================================
// EXTERNAL HERO STATS
// =============================================================================

/// Errors loading the hero stat table.
#[derive(Debug, thiserror::Error)]
pub enum HeroStatsError {
    #[error("failed to read hero stats: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse hero stats: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct HeroStatEntry {
    name: Option<String>,
    id: Option<String>,
    #[serde(rename = "hpMax")]
    hp_max_camel: Option<u32>,
    hp: Option<u32>,
    hp_max: Option<u32>,
}

/// Read-only name/id -> max HP lookup supplied at startup.
#[derive(Clone, Debug, Default)]
pub struct HeroStatsTable {
    max_hp: HashMap<String, u32>,
}

impl HeroStatsTable {
    /// Empty table: every lookup falls back to kit defaults.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a JSON array of `{ name?, id?, hpMax? | hp? | hp_max? }`.
    pub fn from_json(json: &str) -> Result<Self, HeroStatsError> {
        let entries: Vec<HeroStatEntry> = serde_json::from_str(json)?;
        let mut max_hp = HashMap::new();
        for entry in entries {
            let Some(hp) = entry.hp_max_camel.or(entry.hp).or(entry.hp_max) else {
                continue;
            };
            if hp == 0 {
                continue;
            }
            for key in [entry.name, entry.id].into_iter().flatten() {
                max_hp.insert(key, hp);
            }
        }
        Ok(Self { max_hp })
    }

    /// Load from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, HeroStatsError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Load from the first readable candidate, or an empty table.
    pub fn load_first<P: AsRef<Path>>(candidates: &[P]) -> Self {
        for path in candidates {
            match Self::load(path) {
                Ok(table) => {
                    info!(
                        "Loaded {} hero stat entries from {}",
                        table.len(),
                        path.as_ref().display()
                    );
                    return table;
                }
                Err(e) => {
                    warn!("Skipping hero stats at {}: {}", path.as_ref().display(), e);
                }
            }
        }
        warn!("No hero stats file found, using built-in max HP");
        Self::empty()
    }

    pub fn len(&self) -> usize {
        self.max_hp.len()
    }

    pub fn is_empty(&self) -> bool {
        self.max_hp.is_empty()
    }

    /// Max HP for a hero name or id.
    pub fn max_hp(&self, key: &str) -> Option<u32> {
        self.max_hp.get(key).copied()
    }

    /// Resolve max HP: external table, then hero override, then role base.
    pub fn resolve_max_hp(&self, role: Role, name: &str) -> u32 {
        self.max_hp(name).unwrap_or_else(|| kit_for(role, name).max_hp)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_kits() {
        assert_eq!(Role::Tank.base_max_hp(), 18);
        assert_eq!(Role::Dps1.base_max_hp(), 8);
        assert_eq!(Role::Dps2.base_max_hp(), 11);
        assert_eq!(Role::Support.base_max_hp(), 10);

        let dps2 = base_kit(Role::Dps2);
        assert!(dps2.special.requires_moved);
        assert_eq!(dps2.special.cooldown, 3);
        assert_eq!(dps2.special.cost, None);
    }

    #[test]
    fn test_hero_overrides() {
        let bear = kit_for(Role::Tank, "Little Bear");
        assert_eq!(bear.max_hp, 13);
        assert_eq!(bear.special.effect, AbilityEffect::Transform { turns: 3 });
        assert_eq!(bear.special.energy_cost(), 5);

        let voodoo = kit_for(Role::Tank, "Voodoo");
        assert_eq!(voodoo.max_hp, 18);
        assert_eq!(voodoo.primary.name, "Pin Cushion");

        let aimbot = kit_for(Role::Dps1, AIMBOT);
        assert!(aimbot.primary.exact_range);
        assert_eq!(aimbot.primary.range, 3);

        let blossom = kit_for(Role::Support, "Death Blossom");
        assert_eq!(blossom.primary.name, "Mend");
        assert_eq!(blossom.special.name, "Healing Petal");

        // No override keeps the role kit
        assert_eq!(kit_for(Role::Dps1, "DPS1"), base_kit(Role::Dps1));
    }

    #[test]
    fn test_card_costs() {
        assert_eq!(CardKind::Fireball.cost(), 4);
        assert_eq!(CardKind::BlossomWall.cost(), CardKind::HealingPetal.cost());
        assert_eq!(CardKind::Teleport.cost(), 0);
        assert_eq!(CardKind::Fmj.cost(), 6);
    }

    #[test]
    fn test_card_kind_wire_names() {
        assert_eq!(serde_json::to_string(&CardKind::Fmj).unwrap(), "\"FMJ\"");
        let parsed: CardKind = serde_json::from_str("\"IronSkin\"").unwrap();
        assert_eq!(parsed, CardKind::IronSkin);
        assert_eq!(CardKind::IronSkin.to_string(), "IronSkin");
        assert!(serde_json::from_str::<CardKind>("\"Nope\"").is_err());
    }

    #[test]
    fn test_team_pick_valid() {
        let pick = TeamPick::resolve(&["death_blossom", "aimbot", "voodoo", "trickster"]).unwrap();
        assert_eq!(pick.hero_for(Role::Tank), HeroId::Voodoo);
        assert_eq!(pick.hero_for(Role::Dps1), HeroId::Aimbot);
        assert_eq!(pick.hero_for(Role::Dps2), HeroId::Trickster);
        assert_eq!(pick.hero_for(Role::Support), HeroId::DeathBlossom);
    }

    #[test]
    fn test_team_pick_invalid() {
        // Two tanks
        assert!(TeamPick::resolve(&["voodoo", "loadstone", "aimbot", "death_blossom"]).is_none());
        // Unknown ids are dropped, leaving too few heroes
        assert!(TeamPick::resolve(&["voodoo", "mystery", "aimbot", "death_blossom"]).is_none());
        assert!(TeamPick::resolve::<&str>(&[]).is_none());
    }

    #[test]
    fn test_hero_stats_table() {
        let json = r#"[
            {"name": "Aimbot", "id": "aimbot", "hpMax": 9},
            {"name": "Voodoo", "hp": 20},
            {"id": "loadstone", "hp_max": 16},
            {"name": "Ghost"}
        ]"#;
        let table = HeroStatsTable::from_json(json).unwrap();
        assert_eq!(table.max_hp("Aimbot"), Some(9));
        assert_eq!(table.max_hp("aimbot"), Some(9));
        assert_eq!(table.max_hp("Voodoo"), Some(20));
        assert_eq!(table.max_hp("loadstone"), Some(16));
        assert_eq!(table.max_hp("Ghost"), None);

        assert_eq!(table.resolve_max_hp(Role::Dps1, "Aimbot"), 9);
        assert_eq!(table.resolve_max_hp(Role::Tank, "Little Bear"), 13);
        assert_eq!(table.resolve_max_hp(Role::Support, "Support"), 10);
    }

    #[test]
    fn test_hero_stats_bad_json() {
        assert!(HeroStatsTable::from_json("{not json").is_err());
    }

    #[test]
    fn test_load_first_missing_files_is_empty() {
        let table = HeroStatsTable::load_first(&["/nonexistent/characters.json"]);
        assert!(table.is_empty());
    }
}
