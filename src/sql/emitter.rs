use super::{comment_text, jsonb, quote, quote_opt, text_array, truncate};
use crate::models::franchise::{Character, Company, ConsolidatedFranchise, Person, Work};
use serde_json::{Map, Value, json};

const FRANCHISE_DESCRIPTION_MAX: usize = 500;
const BIOGRAPHY_MAX: usize = 1000;

fn ids_json(anilist: Option<i32>, mal: Option<i32>) -> Map<String, Value> {
    let mut map = Map::new();
    if let Some(id) = anilist {
        map.insert("anilist_id".to_string(), json!(id));
    }
    if let Some(id) = mal {
        map.insert("mal_id".to_string(), json!(id));
    }
    map
}

/// Slug characters are stored under: the franchise slug is appended so that
/// common names stay unique across franchises.
fn character_slug(character: &str, franchise: &str) -> String {
    format!("{character}-{franchise}")
}

fn franchise_sql(franchise: &ConsolidatedFranchise) -> String {
    let description = franchise
        .description
        .as_deref()
        .map(|d| truncate(d, FRANCHISE_DESCRIPTION_MAX));
    format!(
        "
INSERT INTO franchises (id, name, slug, description)
VALUES (gen_random_uuid(), {}, {}, {})
ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name;
",
        quote(&franchise.name),
        quote(&franchise.slug),
        quote_opt(description.as_deref()),
    )
}

fn company_sql(company: &Company) -> String {
    let websites = Value::Object(ids_json(company.ids.anilist, company.ids.mal));
    format!(
        "
INSERT INTO companies (id, name, slug, websites)
VALUES (gen_random_uuid(), {}, {}, {})
ON CONFLICT (slug) DO UPDATE SET websites = companies.websites || EXCLUDED.websites;
",
        quote(&company.name),
        quote(&company.slug),
        jsonb(&websites),
    )
}

fn creator_sql(person: &Person) -> String {
    let mut details = ids_json(person.ids.anilist, person.ids.mal);
    if !person.occupations.is_empty() {
        details.insert("occupations".to_string(), json!(person.occupations));
    }
    let biography = person.description.as_deref().map(|d| truncate(d, BIOGRAPHY_MAX));

    format!(
        "
INSERT INTO creators (id, full_name, native_name, slug, biography, birth_date, death_date, details)
VALUES (gen_random_uuid(), {}, {}, {}, {}, {}, {}, {})
ON CONFLICT (slug) DO UPDATE SET details = creators.details || EXCLUDED.details;
",
        quote(&person.name),
        quote_opt(person.native_name.as_deref()),
        quote(&person.slug),
        quote_opt(biography.as_deref()),
        quote_opt(person.birth_date.map(|d| d.to_string()).as_deref()),
        quote_opt(person.death_date.map(|d| d.to_string()).as_deref()),
        jsonb(&Value::Object(details)),
    )
}

fn entry_details(work: &Work) -> Value {
    let mut details = Map::new();
    details.insert("anilist_ids".to_string(), json!(work.ids.anilist));
    details.insert("format".to_string(), json!(work.format.map(|f| f.as_str())));
    if !work.ids.mal.is_empty() {
        details.insert("mal_ids".to_string(), json!(work.ids.mal));
    }
    if let Some(tvdb) = work.ids.tvdb {
        details.insert("tvdb_id".to_string(), json!(tvdb));
    }
    if let Some(n) = work.episode_count {
        details.insert("episodes".to_string(), json!(n));
    }
    if let Some(n) = work.chapter_count {
        details.insert("chapters".to_string(), json!(n));
    }
    if let Some(n) = work.volume_count {
        details.insert("volumes".to_string(), json!(n));
    }
    if let Some(source) = &work.source_material {
        details.insert("source".to_string(), json!(source));
    }
    if work.consolidated {
        details.insert("consolidated".to_string(), json!(true));
    }
    Value::Object(details)
}

fn entry_sql(work: &Work, franchise_slug: &str) -> String {
    let mut alternate_titles = work.alternate_titles.clone();
    if let Some(native) = work.title_native.as_ref().filter(|n| !alternate_titles.contains(n)) {
        alternate_titles.push(native.clone());
    }

    let slug = quote(&work.slug);
    let mut out = format!(
        "-- Entry: {}

INSERT INTO entries (id, media_type_id, title, alternate_titles, slug, release_date, status, description, locale_code, details)
SELECT gen_random_uuid(), mt.id, {}, {}, {slug},
       {}, '{}', {}, 'ja', {}
FROM media_types mt WHERE mt.name = '{}'
ON CONFLICT (slug) DO UPDATE SET description = EXCLUDED.description, details = entries.details || EXCLUDED.details;
",
        comment_text(&work.title),
        quote(&work.title),
        text_array(&alternate_titles),
        quote_opt(work.release_date.map(|d| d.to_string()).as_deref()),
        work.status.as_str(),
        quote_opt(work.description.as_deref()),
        jsonb(&entry_details(work)),
        work.media_type.as_str(),
    );

    for season in &work.seasons {
        if !season.is_verified() {
            out.push_str(&format!(
                "-- Season {} has no authoritative episode-database match\n",
                season.number
            ));
        }
        out.push_str(&format!(
            "
INSERT INTO entry_seasons (id, entry_id, season_number, title, episode_count, air_date_start, air_date_end)
SELECT gen_random_uuid(), e.id, {}, {}, {}, {}, {}
FROM entries e WHERE e.slug = {slug}
ON CONFLICT (entry_id, season_number) DO NOTHING;
",
            season.number,
            quote_opt(season.title.as_deref()),
            season
                .episode_count
                .map_or_else(|| "NULL".to_string(), |n| n.to_string()),
            quote_opt(season.air_date_start.map(|d| d.to_string()).as_deref()),
            quote_opt(season.air_date_end.map(|d| d.to_string()).as_deref()),
        ));
    }

    out.push_str(&format!(
        "
INSERT INTO entry_franchises (id, entry_id, franchise_id)
SELECT gen_random_uuid(), e.id, f.id
FROM entries e, franchises f
WHERE e.slug = {slug} AND f.slug = {}
ON CONFLICT (entry_id, franchise_id) DO NOTHING;
",
        quote(franchise_slug),
    ));

    for genre in &work.genres {
        out.push_str(&format!(
            "
INSERT INTO entry_genres (id, entry_id, genre_id)
SELECT gen_random_uuid(), e.id, g.id
FROM entries e, genres g
WHERE e.slug = {slug} AND g.name = {}
ON CONFLICT (entry_id, genre_id) DO NOTHING;
",
            quote(genre),
        ));
    }

    for tag in &work.tags {
        out.push_str(&format!(
            "
INSERT INTO entry_tags (id, entry_id, tag_id)
SELECT gen_random_uuid(), e.id, t.id
FROM entries e, tags t
WHERE e.slug = {slug} AND t.name = {}
ON CONFLICT (entry_id, tag_id) DO NOTHING;
",
            quote(tag),
        ));
    }

    out
}

fn character_sql(character: &Character, franchise_slug: &str) -> String {
    let details = Value::Object(ids_json(character.ids.anilist, character.ids.mal));
    let description = character
        .description
        .as_deref()
        .map(|d| truncate(d, BIOGRAPHY_MAX));

    format!(
        "
INSERT INTO characters (id, name, native_name, slug, description, alternate_names, franchise_id, details)
SELECT gen_random_uuid(), {}, {}, {}, {}, {}, f.id, {}
FROM franchises f WHERE f.slug = {}
ON CONFLICT (slug) DO UPDATE SET details = characters.details || EXCLUDED.details;
",
        quote(&character.name),
        quote_opt(character.native_name.as_deref()),
        quote(&character_slug(&character.slug, franchise_slug)),
        quote_opt(description.as_deref()),
        text_array(&character.alternate_names),
        jsonb(&details),
        quote(franchise_slug),
    )
}

/// Renders the whole franchise as one transaction of idempotent upserts.
///
/// Reference rows (companies, creators) come first, then each entry with its
/// seasons and links, then characters, cast, voice roles and relationships.
#[must_use]
pub fn render(franchise: &ConsolidatedFranchise) -> String {
    let fslug = franchise.slug.as_str();
    let mut out = String::new();

    out.push_str(&format!(
        "-- ============================================================================
-- SQL for franchise: {fslug}
-- Entries: {}
-- ============================================================================

BEGIN;
",
        franchise.works.len()
    ));

    out.push_str(&franchise_sql(franchise));

    if !franchise.companies.is_empty() {
        out.push_str("\n-- Companies\n");
        for company in &franchise.companies {
            out.push_str(&company_sql(company));
        }
    }

    if !franchise.persons.is_empty() {
        out.push_str("\n-- Creators\n");
        for person in &franchise.persons {
            out.push_str(&creator_sql(person));
        }
    }

    for work in &franchise.works {
        out.push('\n');
        out.push_str(&entry_sql(work, fslug));

        for credit in franchise.company_credits.iter().filter(|c| c.work == work.slug) {
            out.push_str(&format!(
                "
INSERT INTO entry_companies (id, entry_id, company_id, role_id)
SELECT gen_random_uuid(), e.id, c.id, cr.id
FROM entries e, companies c, company_roles cr
WHERE e.slug = {} AND c.slug = {} AND cr.name = '{}'
ON CONFLICT (entry_id, company_id, role_id) DO NOTHING;
",
                quote(&credit.work),
                quote(&credit.company),
                credit.role.as_str(),
            ));
        }

        for credit in franchise.credits.iter().filter(|c| c.work == work.slug) {
            out.push_str(&format!(
                "
INSERT INTO entry_creators (id, entry_id, creator_id, role_id)
SELECT gen_random_uuid(), e.id, c.id, r.id
FROM entries e, creators c, creator_roles r
WHERE e.slug = {} AND c.slug = {} AND r.name = {}
ON CONFLICT DO NOTHING;
",
                quote(&credit.work),
                quote(&credit.person),
                quote(&credit.role),
            ));
        }
    }

    if !franchise.characters.is_empty() {
        out.push_str("\n-- Characters\n");
        for character in &franchise.characters {
            out.push_str(&character_sql(character, fslug));
        }
    }

    for cast in &franchise.cast {
        out.push_str(&format!(
            "
INSERT INTO entry_characters (id, entry_id, character_id, role)
SELECT gen_random_uuid(), e.id, c.id, '{}'
FROM entries e, characters c
WHERE e.slug = {} AND c.slug = {}
ON CONFLICT (entry_id, character_id) DO NOTHING;
",
            cast.role.as_str(),
            quote(&cast.work),
            quote(&character_slug(&cast.character, fslug)),
        ));
    }

    if !franchise.voice_roles.is_empty() {
        out.push_str("\n-- Voice Actor roles\n");
        for role in &franchise.voice_roles {
            out.push_str(&format!(
                "
INSERT INTO entry_creators (id, entry_id, creator_id, role_id, character_id, language)
SELECT gen_random_uuid(), e.id, cr.id, r.id, ch.id, {}
FROM entries e, creators cr, creator_roles r, characters ch
WHERE e.slug = {} AND cr.slug = {} AND r.name = 'voice_actor' AND ch.slug = {}
ON CONFLICT DO NOTHING;
",
                quote(&role.language),
                quote(&role.work),
                quote(&role.person),
                quote(&character_slug(&role.character, fslug)),
            ));
        }
    }

    if !franchise.relationships.is_empty() {
        out.push_str("\n-- Entry relationships\n");
        for rel in &franchise.relationships {
            out.push_str(&format!(
                "
INSERT INTO entry_relationships (id, source_entry_id, target_entry_id, relationship_type_id)
SELECT gen_random_uuid(), s.id, t.id, rt.id
FROM entries s, entries t, relationship_types rt
WHERE s.slug = {} AND t.slug = {} AND rt.name = '{}'
ON CONFLICT (source_entry_id, target_entry_id, relationship_type_id) DO NOTHING;
",
                quote(&rel.source),
                quote(&rel.target),
                rel.kind.as_str(),
            ));
        }
    }

    out.push_str(&format!(
        "
COMMIT;

SELECT {} as status;
SELECT COUNT(*) as entries FROM entries e JOIN entry_franchises ef ON ef.entry_id = e.id JOIN franchises f ON ef.franchise_id = f.id WHERE f.slug = {};
",
        quote(&format!("Loaded franchise: {}", franchise.name)),
        quote(fslug),
    ));

    out
}
