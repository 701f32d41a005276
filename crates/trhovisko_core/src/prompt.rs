//! crates/trhovisko_core/src/prompt.rs
//!
//! Pure, deterministic prompt rendering. Every function here takes a typed
//! domain object and produces a Slovak-language instruction string; no I/O,
//! no randomness. Identical input always yields byte-identical output, which
//! keeps tests deterministic and cache keys safe.
//!
//! Missing optional fields render as omitted lines, never as a literal
//! "null". Empty required fields are the caller's problem: the feature
//! endpoints reject them before a prompt is ever built.

use crate::domain::{AdData, ChatContextType, ChatTurn, ProductInfo};

//=========================================================================================
// JSON Shape Hints
//=========================================================================================

/// Shape hint appended to the quality evaluation prompt.
pub const QUALITY_SCHEMA: &str = r#"Odpovedz IBA platným JSON objektom presne v tomto tvare, bez akéhokoľvek ďalšieho textu:
{"totalScore": <celé číslo 0-100>, "breakdown": {"description": <0-30>, "photos": <0-25>, "specifications": <0-25>, "pricing": <0-20>}, "suggestions": ["konkrétne odporúčanie"], "strengths": ["silná stránka"], "weaknesses": ["slabá stránka"]}"#;

/// Shape hint appended to the semantic search prompt.
pub const SEARCH_SCHEMA: &str = r#"Odpovedz IBA platným JSON objektom presne v tomto tvare, bez akéhokoľvek ďalšieho textu:
{"category": "kategória alebo null", "keywords": ["kľúčové slovo"], "minPriceEur": <číslo alebo null>, "maxPriceEur": <číslo alebo null>, "location": "mesto alebo null", "condition": "nový/používaný alebo null"}"#;

/// Shape hint appended to the product comparison prompt.
pub const COMPARISON_SCHEMA: &str = r#"Odpovedz IBA platným JSON objektom presne v tomto tvare, bez akéhokoľvek ďalšieho textu:
{"summary": "krátke zhrnutie", "comparison": "podrobné porovnanie", "recommendation": "odporúčanie", "suitability": ["pre koho je ktorý produkt vhodný"]}"#;

//=========================================================================================
// Product Description
//=========================================================================================

/// Renders the prompt for generating an ad description from structured
/// product attributes.
pub fn description_prompt(product: &ProductInfo) -> String {
    let mut prompt = String::from(
        "Si skúsený copywriter pre slovenský online bazár. Napíš pútavý, pravdivý \
         a dôveryhodný popis inzerátu pre nasledujúci produkt. Píš po slovensky, \
         v 2 až 4 odsekoch, bez zoznamov a bez preháňania.\n\n",
    );
    prompt.push_str(&product_section(product));
    prompt.push_str("\nPopis inzerátu:");
    prompt
}

/// Renders one product as a block of labeled lines. Optional fields that are
/// absent produce no line at all.
fn product_section(product: &ProductInfo) -> String {
    let mut section = String::new();
    section.push_str(&format!("Názov: {}\n", product.name));
    section.push_str(&format!("Kategória: {}\n", product.category));
    if let Some(brand) = &product.brand {
        section.push_str(&format!("Značka: {}\n", brand));
    }
    if let Some(condition) = &product.condition {
        section.push_str(&format!("Stav: {}\n", condition));
    }
    if !product.features.is_empty() {
        section.push_str(&format!("Vlastnosti: {}\n", product.features.join(", ")));
    }
    if let Some(price) = product.price_eur {
        section.push_str(&format!("Cena: {:.2} EUR\n", price));
    }
    if let Some(location) = &product.location {
        section.push_str(&format!("Lokalita: {}\n", location));
    }
    section
}

//=========================================================================================
// Quality Evaluation
//=========================================================================================

/// Renders the prompt for scoring the quality of a listing.
pub fn quality_prompt(ad: &AdData) -> String {
    let mut prompt = String::from(
        "Si hodnotiteľ kvality inzerátov na slovenskom online bazári. Ohodnoť \
         nasledujúci inzerát podľa úplnosti popisu, fotografií, špecifikácií a \
         primeranosti ceny. Buď konkrétny a praktický.\n\n",
    );
    prompt.push_str(&format!("Nadpis: {}\n", ad.title));
    prompt.push_str(&format!("Kategória: {}\n", ad.category));
    prompt.push_str(&format!("Popis: {}\n", ad.description));
    if let Some(price) = ad.price_eur {
        prompt.push_str(&format!("Cena: {:.2} EUR\n", price));
    }
    if let Some(location) = &ad.location {
        prompt.push_str(&format!("Lokalita: {}\n", location));
    }
    prompt.push_str(&format!("Počet fotografií: {}\n", ad.photo_count));
    if !ad.specifications.is_empty() {
        prompt.push_str(&format!("Špecifikácie: {}\n", ad.specifications.join(", ")));
    }
    prompt
}

//=========================================================================================
// Semantic Search
//=========================================================================================

/// Renders the prompt that turns a free-text query into search filters.
pub fn search_prompt(query: &str) -> String {
    format!(
        "Si analyzátor vyhľadávacích dopytov slovenského online bazára. Z \
         nasledujúceho dopytu kupujúceho vyextrahuj štruktúrované filtre: \
         kategóriu, kľúčové slová, cenové rozpätie v eurách, lokalitu a \
         požadovaný stav. Polia, ktoré sa v dopyte nenachádzajú, nechaj null.\n\n\
         Dopyt: {}",
        query
    )
}

//=========================================================================================
// Product Comparison
//=========================================================================================

/// Renders the prompt for comparing 2-4 products within one category.
pub fn comparison_prompt(products: &[ProductInfo], category: &str) -> String {
    let mut prompt = format!(
        "Si nezávislý poradca pre nákup v kategórii {}. Objektívne porovnaj \
         nasledujúce produkty, zhodnoť pomer ceny a úžitku a odporuč, ktorý sa \
         komu oplatí. Píš po slovensky.\n\n",
        category
    );
    for (index, product) in products.iter().enumerate() {
        prompt.push_str(&format!("Produkt {}:\n", index + 1));
        prompt.push_str(&product_section(product));
        prompt.push('\n');
    }
    prompt
}

//=========================================================================================
// Chat Assistant
//=========================================================================================

/// System instructions for the chat assistant, fixed per context type.
pub fn chat_instructions(context: ChatContextType) -> &'static str {
    match context {
        ChatContextType::General => {
            "Si priateľský asistent slovenského online bazára Trhovisko. Odpovedaj \
             po slovensky, stručne a prakticky. Ak nevieš odpoveď, povedz to."
        }
        ChatContextType::AdHelp => {
            "Si asistent slovenského online bazára Trhovisko a pomáhaš predajcom \
             vytvárať a vylepšovať inzeráty. Radíš, ako napísať nadpis a popis, aké \
             fotografie pridať a ako nastaviť cenu. Odpovedaj po slovensky a konkrétne."
        }
        ChatContextType::BuyingGuide => {
            "Si nákupný poradca slovenského online bazára Trhovisko. Pomáhaš \
             kupujúcim vybrať vhodný produkt, porovnať možnosti a odhaliť riziká \
             pri kúpe z druhej ruky. Odpovedaj po slovensky."
        }
        ChatContextType::Support => {
            "Si pracovník podpory slovenského online bazára Trhovisko. Pomáhaš s \
             účtami, platbami kreditov a nahlasovaním problémových inzerátov. \
             Odpovedaj po slovensky, zdvorilo a vecne."
        }
    }
}

/// Returns the most recent `max_turns` turns of a conversation. Unbounded
/// history would eventually exceed the provider's context limit, so the
/// window is applied every time history is rendered into a request.
pub fn window_history(history: &[ChatTurn], max_turns: usize) -> &[ChatTurn] {
    if history.len() > max_turns {
        &history[history.len() - max_turns..]
    } else {
        history
    }
}
