//! Image CRUD operations.

use std::str::FromStr;

use chrono::Utc;
use galleria_core::{Error, ImageId, ImageStatus, Result};
use rusqlite::{Connection, OptionalExtension};

use crate::models::{Image, ImageRecord, NewImage};
use crate::queries::{references, tags};

const COLS: &str = "id, title, author, prompt, description, type, category, status, \
                    file_path, thumbnail_path, heat_score, created_at";

/// Result ordering for [`list_images`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ImageSort {
    /// Insertion order.
    #[default]
    Oldest,
    /// Most recent first.
    Newest,
    /// Highest heat score first, newest breaking ties.
    Hot,
    Random,
}

impl ImageSort {
    fn order_by(self) -> &'static str {
        match self {
            ImageSort::Oldest => "created_at, rowid",
            ImageSort::Newest => "created_at DESC, rowid DESC",
            ImageSort::Hot => "heat_score DESC, created_at DESC, rowid DESC",
            ImageSort::Random => "random()",
        }
    }
}

impl FromStr for ImageSort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "oldest" => Ok(ImageSort::Oldest),
            "date" | "newest" => Ok(ImageSort::Newest),
            "hot" => Ok(ImageSort::Hot),
            "random" => Ok(ImageSort::Random),
            other => Err(Error::Validation(format!("unknown sort order: {other}"))),
        }
    }
}

/// Optional filters for [`list_images`].
#[derive(Debug, Clone, Default)]
pub struct ImageFilter<'a> {
    pub status: Option<ImageStatus>,
    pub category: Option<&'a str>,
    /// Only images carrying this tag.
    pub tag: Option<&'a str>,
    /// Case-insensitive substring match on title, prompt or author.
    pub search: Option<&'a str>,
    /// Drop images that carry any sensitive tag.
    pub hide_sensitive: bool,
    pub sort: ImageSort,
}

/// A visitor interaction counted towards an image's heat score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engagement {
    View,
    Copy,
}

impl Engagement {
    /// Heat points one interaction of this kind is worth.
    pub fn weight(self) -> i64 {
        match self {
            Engagement::View => 1,
            Engagement::Copy => 10,
        }
    }
}

/// Build a `LIKE` pattern matching `needle` anywhere, with wildcards escaped.
fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Insert a new image row.
pub fn create_image(conn: &Connection, new: &NewImage) -> Result<Image> {
    let id = ImageId::new();
    let created_at = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO images (id, title, author, prompt, description, type, category, status,
                             file_path, thumbnail_path, heat_score, created_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
        rusqlite::params![
            id.to_string(),
            new.title,
            new.author,
            new.prompt,
            new.description,
            new.image_type,
            new.category,
            new.status.as_str(),
            new.file_path,
            new.thumbnail_path,
            new.heat_score,
            created_at,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;

    Ok(Image {
        id,
        title: new.title.clone(),
        author: new.author.clone(),
        prompt: new.prompt.clone(),
        description: new.description.clone(),
        image_type: new.image_type.clone(),
        category: new.category.clone(),
        status: new.status,
        file_path: new.file_path.clone(),
        thumbnail_path: new.thumbnail_path.clone(),
        heat_score: new.heat_score,
        created_at,
    })
}

/// Get an image by ID.
pub fn get_image(conn: &Connection, id: ImageId) -> Result<Option<Image>> {
    let q = format!("SELECT {COLS} FROM images WHERE id = ?1");
    conn.query_row(&q, [id.to_string()], Image::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// Find the first image with exactly this title and author.
///
/// This is the duplicate check run before every import.
pub fn find_by_title_author(conn: &Connection, title: &str, author: &str) -> Result<Option<Image>> {
    let q = format!("SELECT {COLS} FROM images WHERE title = ?1 AND author = ?2 LIMIT 1");
    conn.query_row(&q, rusqlite::params![title, author], Image::from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// List images matching `filter`, in the filter's sort order.
pub fn list_images(conn: &Connection, filter: &ImageFilter<'_>) -> Result<Vec<Image>> {
    let q = format!(
        "SELECT {COLS} FROM images
         WHERE (?1 IS NULL OR status = ?1)
           AND (?2 IS NULL OR category = ?2)
           AND (?3 IS NULL OR EXISTS (
                SELECT 1 FROM image_tags it JOIN tags t ON t.id = it.tag_id
                WHERE it.image_id = images.id AND t.name = ?3))
           AND (?4 IS NULL
                OR title LIKE ?4 ESCAPE '\\'
                OR prompt LIKE ?4 ESCAPE '\\'
                OR author LIKE ?4 ESCAPE '\\')
           AND (?5 = 0 OR NOT EXISTS (
                SELECT 1 FROM image_tags it JOIN tags t ON t.id = it.tag_id
                WHERE it.image_id = images.id AND t.is_sensitive = 1))
         ORDER BY {}",
        filter.sort.order_by()
    );
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(
            rusqlite::params![
                filter.status.map(|s| s.as_str()),
                filter.category,
                filter.tag,
                filter.search.map(contains_pattern),
                filter.hide_sensitive,
            ],
            Image::from_row,
        )
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Move an image through the moderation queue.
pub fn set_status(conn: &Connection, id: ImageId, status: ImageStatus) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE images SET status = ?1 WHERE id = ?2",
            rusqlite::params![status.as_str(), id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Count one view or copy and recompute the heat score from the counters.
///
/// The recomputed score replaces any imported value. Returns `false` when
/// the image does not exist.
pub fn record_engagement(conn: &Connection, id: ImageId, kind: Engagement) -> Result<bool> {
    let (views, copies) = match kind {
        Engagement::View => (1, 0),
        Engagement::Copy => (0, 1),
    };
    let n = conn
        .execute(
            "UPDATE images
             SET views_count  = views_count + ?1,
                 copies_count = copies_count + ?2,
                 heat_score   = (views_count + ?1) * ?3 + (copies_count + ?2) * ?4
             WHERE id = ?5",
            rusqlite::params![
                views,
                copies,
                Engagement::View.weight(),
                Engagement::Copy.weight(),
                id.to_string()
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Delete an image together with its references and tag links.
///
/// Children are removed explicitly before the parent inside one
/// transaction; tags themselves are shared and stay.
pub fn delete_image(conn: &Connection, id: ImageId) -> Result<bool> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    references::delete_references_for_image(&tx, id)?;
    tags::detach_all_tags(&tx, id)?;
    let n = tx
        .execute("DELETE FROM images WHERE id = ?1", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;

    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Total number of images.
pub fn count_images(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM images", [], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))
}

/// Load an image with its tags and ordered references.
pub fn load_image_record(conn: &Connection, id: ImageId) -> Result<Option<ImageRecord>> {
    let Some(image) = get_image(conn, id)? else {
        return Ok(None);
    };
    let tags = tags::list_tags_for_image(conn, id)?;
    let refs = references::list_references(conn, id)?;
    Ok(Some(ImageRecord { image, tags, refs }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{init_memory_pool, PooledConnection};

    fn setup() -> PooledConnection {
        let pool = init_memory_pool().unwrap();
        pool.get().unwrap()
    }

    fn new_image(title: &str, author: &str) -> NewImage {
        NewImage {
            title: title.into(),
            author: author.into(),
            prompt: "a cat, watercolor".into(),
            description: String::new(),
            image_type: "txt2img".into(),
            category: "gallery".into(),
            status: ImageStatus::Pending,
            file_path: format!("/uploads/{title}.png"),
            thumbnail_path: None,
            heat_score: 0,
        }
    }

    #[test]
    fn create_and_get() {
        let conn = setup();
        let img = create_image(&conn, &new_image("Cat", "ann")).unwrap();

        let fetched = get_image(&conn, img.id).unwrap().unwrap();
        assert_eq!(fetched, img);
        assert_eq!(fetched.status, ImageStatus::Pending);
        assert!(get_image(&conn, ImageId::new()).unwrap().is_none());
    }

    #[test]
    fn find_by_title_author_matches_both_fields() {
        let conn = setup();
        create_image(&conn, &new_image("Cat", "")).unwrap();

        assert!(find_by_title_author(&conn, "Cat", "").unwrap().is_some());
        assert!(find_by_title_author(&conn, "Cat", "bob").unwrap().is_none());
        assert!(find_by_title_author(&conn, "Dog", "").unwrap().is_none());
    }

    #[test]
    fn list_filters_by_status_and_category() {
        let conn = setup();
        let a = create_image(&conn, &new_image("A", "")).unwrap();
        let mut tpl = new_image("B", "");
        tpl.category = "template".into();
        create_image(&conn, &tpl).unwrap();
        set_status(&conn, a.id, ImageStatus::Approved).unwrap();

        let all = list_images(&conn, &ImageFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].title, "A");

        let approved = list_images(
            &conn,
            &ImageFilter {
                status: Some(ImageStatus::Approved),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id, a.id);

        let templates = list_images(
            &conn,
            &ImageFilter {
                category: Some("template"),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].title, "B");
    }

    #[test]
    fn list_filters_by_tag_and_keyword() {
        let conn = setup();
        let mut cat = new_image("Sleepy cat", "ann");
        cat.prompt = "watercolor kitten".into();
        let cat = create_image(&conn, &cat).unwrap();
        let mut dog = new_image("Dog", "Bob_Smith");
        dog.prompt = "oil painting, 100% detail".into();
        create_image(&conn, &dog).unwrap();

        let tag = tags::find_or_create_tag(&conn, "animal").unwrap();
        tags::attach_tag(&conn, cat.id, tag.id).unwrap();

        let titles = |filter: ImageFilter<'_>| -> Vec<String> {
            list_images(&conn, &filter)
                .unwrap()
                .into_iter()
                .map(|i| i.title)
                .collect()
        };

        let tagged = titles(ImageFilter {
            tag: Some("animal"),
            ..Default::default()
        });
        assert_eq!(tagged, vec!["Sleepy cat"]);

        // title, prompt and author all match, case-insensitively
        for needle in ["SLEEPY", "kitten", "ann"] {
            let found = titles(ImageFilter {
                search: Some(needle),
                ..Default::default()
            });
            assert_eq!(found, vec!["Sleepy cat"], "search {needle:?}");
        }

        // LIKE wildcards in the needle are literal
        let found = titles(ImageFilter {
            search: Some("100%"),
            ..Default::default()
        });
        assert_eq!(found, vec!["Dog"]);
        assert!(titles(ImageFilter {
            search: Some("b_b"),
            ..Default::default()
        })
        .is_empty());
    }

    #[test]
    fn list_hides_images_with_sensitive_tags() {
        let conn = setup();
        let safe = create_image(&conn, &new_image("Safe", "")).unwrap();
        let nsfw = create_image(&conn, &new_image("Nsfw", "")).unwrap();
        let plain = tags::find_or_create_tag(&conn, "plain").unwrap();
        let spicy = tags::find_or_create_tag(&conn, "spicy").unwrap();
        tags::attach_tag(&conn, safe.id, plain.id).unwrap();
        tags::attach_tag(&conn, nsfw.id, plain.id).unwrap();
        tags::attach_tag(&conn, nsfw.id, spicy.id).unwrap();
        tags::set_sensitive(&conn, "spicy", true).unwrap();

        let visible = list_images(
            &conn,
            &ImageFilter {
                hide_sensitive: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, safe.id);

        let all = list_images(&conn, &ImageFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn list_sort_orders() {
        let conn = setup();
        let mut a = new_image("A", "");
        a.heat_score = 5;
        create_image(&conn, &a).unwrap();
        let mut b = new_image("B", "");
        b.heat_score = 50;
        create_image(&conn, &b).unwrap();
        create_image(&conn, &new_image("C", "")).unwrap();

        let order = |sort: ImageSort| -> Vec<String> {
            list_images(
                &conn,
                &ImageFilter {
                    sort,
                    ..Default::default()
                },
            )
            .unwrap()
            .into_iter()
            .map(|i| i.title)
            .collect()
        };
        assert_eq!(order(ImageSort::Oldest), vec!["A", "B", "C"]);
        assert_eq!(order(ImageSort::Newest), vec!["C", "B", "A"]);
        assert_eq!(order(ImageSort::Hot), vec!["B", "A", "C"]);

        let mut shuffled = order(ImageSort::Random);
        shuffled.sort();
        assert_eq!(shuffled, vec!["A", "B", "C"]);
    }

    #[test]
    fn engagement_drives_heat_score() {
        let conn = setup();
        let mut imported = new_image("Cat", "");
        imported.heat_score = 99;
        let img = create_image(&conn, &imported).unwrap();

        assert!(record_engagement(&conn, img.id, Engagement::View).unwrap());
        assert!(record_engagement(&conn, img.id, Engagement::View).unwrap());
        assert!(record_engagement(&conn, img.id, Engagement::Copy).unwrap());

        let (views, copies, heat): (i64, i64, i64) = conn
            .query_row(
                "SELECT views_count, copies_count, heat_score FROM images WHERE id = ?1",
                [img.id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .unwrap();
        assert_eq!((views, copies, heat), (2, 1, 12));
        assert_eq!(get_image(&conn, img.id).unwrap().unwrap().heat_score, 12);

        assert!(!record_engagement(&conn, ImageId::new(), Engagement::Copy).unwrap());
    }

    #[test]
    fn sort_parses_query_values() {
        assert_eq!("date".parse::<ImageSort>().unwrap(), ImageSort::Newest);
        assert_eq!("hot".parse::<ImageSort>().unwrap(), ImageSort::Hot);
        assert_eq!("oldest".parse::<ImageSort>().unwrap(), ImageSort::Oldest);
        assert_eq!("random".parse::<ImageSort>().unwrap(), ImageSort::Random);
        assert!(matches!(
            "popular".parse::<ImageSort>(),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn set_status_reports_missing_rows() {
        let conn = setup();
        assert!(!set_status(&conn, ImageId::new(), ImageStatus::Rejected).unwrap());
    }

    #[test]
    fn delete_cascades_to_children_but_keeps_tags() {
        let conn = setup();
        let img = create_image(&conn, &new_image("Cat", "")).unwrap();
        let tag = tags::find_or_create_tag(&conn, "portrait").unwrap();
        tags::attach_tag(&conn, img.id, tag.id).unwrap();
        references::attach_reference(&conn, img.id, "/uploads/ref.png", 0).unwrap();

        assert!(delete_image(&conn, img.id).unwrap());
        assert!(get_image(&conn, img.id).unwrap().is_none());
        assert!(references::list_references(&conn, img.id).unwrap().is_empty());
        assert!(tags::list_tags_for_image(&conn, img.id).unwrap().is_empty());
        assert!(tags::get_tag_by_name(&conn, "portrait").unwrap().is_some());
        assert_eq!(count_images(&conn).unwrap(), 0);

        assert!(!delete_image(&conn, img.id).unwrap());
    }

    #[test]
    fn load_record_collects_children() {
        let conn = setup();
        let img = create_image(&conn, &new_image("Cat", "")).unwrap();
        for name in ["b", "a"] {
            let tag = tags::find_or_create_tag(&conn, name).unwrap();
            tags::attach_tag(&conn, img.id, tag.id).unwrap();
        }
        references::attach_reference(&conn, img.id, "/uploads/r1.png", 1).unwrap();
        references::attach_reference(&conn, img.id, "/uploads/r0.png", 0).unwrap();

        let record = load_image_record(&conn, img.id).unwrap().unwrap();
        assert_eq!(record.tag_names(), vec!["b", "a"]);
        let paths: Vec<_> = record.refs.iter().map(|r| r.file_path.as_str()).collect();
        assert_eq!(paths, vec!["/uploads/r0.png", "/uploads/r1.png"]);
    }
}
