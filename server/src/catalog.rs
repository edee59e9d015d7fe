use std::collections::HashMap;

use crate::error::CatalogError;
use crate::game_logic::normalize::normalize;

/// 1-based slot of a catalog item.
pub type Position = u16;

/// The original 151 Pokémon, in Pokédex order. The two Nidoran carry an
/// explicit suffix so their normalized keys stay distinct.
pub const ORIGINAL_151: [&str; 151] = [
    "Bulbasaur", "Ivysaur", "Venusaur", "Charmander", "Charmeleon", "Charizard",
    "Squirtle", "Wartortle", "Blastoise", "Caterpie", "Metapod", "Butterfree",
    "Weedle", "Kakuna", "Beedrill", "Pidgey", "Pidgeotto", "Pidgeot",
    "Rattata", "Raticate", "Spearow", "Fearow", "Ekans", "Arbok",
    "Pikachu", "Raichu", "Sandshrew", "Sandslash", "Nidoran-F", "Nidorina",
    "Nidoqueen", "Nidoran-M", "Nidorino", "Nidoking", "Clefairy", "Clefable",
    "Vulpix", "Ninetales", "Jigglypuff", "Wigglytuff", "Zubat", "Golbat",
    "Oddish", "Gloom", "Vileplume", "Paras", "Parasect", "Venonat",
    "Venomoth", "Diglett", "Dugtrio", "Meowth", "Persian", "Psyduck",
    "Golduck", "Mankey", "Primeape", "Growlithe", "Arcanine", "Poliwag",
    "Poliwhirl", "Poliwrath", "Abra", "Kadabra", "Alakazam", "Machop",
    "Machoke", "Machamp", "Bellsprout", "Weepinbell", "Victreebel", "Tentacool",
    "Tentacruel", "Geodude", "Graveler", "Golem", "Ponyta", "Rapidash",
    "Slowpoke", "Slowbro", "Magnemite", "Magneton", "Farfetch'd", "Doduo",
    "Dodrio", "Seel", "Dewgong", "Grimer", "Muk", "Shellder",
    "Cloyster", "Gastly", "Haunter", "Gengar", "Onix", "Drowzee",
    "Hypno", "Krabby", "Kingler", "Voltorb", "Electrode", "Exeggcute",
    "Exeggutor", "Cubone", "Marowak", "Hitmonlee", "Hitmonchan", "Lickitung",
    "Koffing", "Weezing", "Rhyhorn", "Rhydon", "Chansey", "Tangela",
    "Kangaskhan", "Horsea", "Seadra", "Goldeen", "Seaking", "Staryu",
    "Starmie", "Mr. Mime", "Scyther", "Jynx", "Electabuzz", "Magmar",
    "Pinsir", "Tauros", "Magikarp", "Gyarados", "Lapras", "Ditto",
    "Eevee", "Vaporeon", "Jolteon", "Flareon", "Porygon", "Omanyte",
    "Omastar", "Kabuto", "Kabutops", "Aerodactyl", "Snorlax", "Articuno",
    "Zapdos", "Moltres", "Dratini", "Dragonair", "Dragonite", "Mewtwo",
    "Mew",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub position: Position,
    pub name: String,
    key: String,
}

impl CatalogEntry {
    /// Normalized form of the name, used for guess comparison.
    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Validated, immutable list of catalog entries with dense positions `1..=len`.
#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    pub fn original_151() -> Result<Self, CatalogError> {
        Self::from_names(ORIGINAL_151)
    }

    /// Builds a catalog numbering `names` from 1 in iteration order.
    pub fn from_names<I, S>(names: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pairs = names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| (idx as Position + 1, name.into()))
            .collect();
        Self::from_entries(pairs)
    }

    pub fn from_entries(mut pairs: Vec<(Position, String)>) -> Result<Self, CatalogError> {
        if pairs.is_empty() {
            return Err(CatalogError::Empty);
        }
        pairs.sort_by_key(|(position, _)| *position);

        let mut seen_keys: HashMap<String, Position> = HashMap::new();
        let mut entries = Vec::with_capacity(pairs.len());
        for (idx, (position, name)) in pairs.into_iter().enumerate() {
            let expected = idx as Position + 1;
            if position != expected {
                return Err(CatalogError::PositionGap {
                    expected,
                    found: position,
                });
            }
            let key = normalize(&name);
            if key.is_empty() {
                return Err(CatalogError::EmptyName(position));
            }
            if let Some(first) = seen_keys.insert(key.clone(), position) {
                return Err(CatalogError::DuplicateKey {
                    key,
                    first,
                    second: position,
                });
            }
            entries.push(CatalogEntry {
                position,
                name,
                key,
            });
        }

        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, position: Position) -> Option<&CatalogEntry> {
        position
            .checked_sub(1)
            .and_then(|idx| self.entries.get(idx as usize))
    }
}
