//! Field-level merging of canonical records.
//!
//! Both functions are additive: a value that is present on the target is
//! never cleared by a missing value on the source. Calling them repeatedly
//! with records from different catalogs is safe.

use super::model::{SeriesMetadata, StaffBuckets};
use crate::catalog::{CanonicalRecord, CoverImage, FuzzyDate, PublicationFormat, SeriesStatus};

fn set_string(target: &mut String, value: &str) {
    if !value.is_empty() {
        *target = value.to_string();
    }
}

fn set_list<T: Clone>(target: &mut Vec<T>, value: &[T]) {
    if !value.is_empty() {
        *target = value.to_vec();
    }
}

fn set_number<T: Copy + Default + PartialEq>(target: &mut T, value: T) {
    if value != T::default() {
        *target = value;
    }
}

fn set_date(target: &mut FuzzyDate, value: FuzzyDate) {
    if !value.is_empty() {
        *target = value;
    }
}

fn set_cover(target: &mut CoverImage, value: &CoverImage) {
    set_string(&mut target.extra_large, &value.extra_large);
    set_string(&mut target.large, &value.large);
    set_string(&mut target.medium, &value.medium);
    set_string(&mut target.color, &value.color);
}

/// Which staff bucket a role belongs to, if any.
fn bucket_for<'a>(staff: &'a mut StaffBuckets, role: &str) -> Option<&'a mut Vec<String>> {
    match role.trim().to_lowercase().as_str() {
        "story" | "original story" | "original creator" => Some(&mut staff.story),
        "art" => Some(&mut staff.art),
        "translation" | "translator" => Some(&mut staff.translation),
        "lettering" | "letterer" => Some(&mut staff.lettering),
        _ => None,
    }
}

/// Merge a resolved record into local metadata.
pub fn merge_record(record: &CanonicalRecord, into: &mut SeriesMetadata) {
    set_string(&mut into.summary, &record.description);
    set_list(&mut into.genres, &record.genres);
    let tag_names: Vec<String> = record.tags.iter().map(|t| t.name.clone()).collect();
    set_list(&mut into.tags, &tag_names);
    set_list(&mut into.characters, &record.characters);

    let mut staff = StaffBuckets::default();
    for credit in &record.staff {
        if let Some(bucket) = bucket_for(&mut staff, &credit.role) {
            if !bucket.contains(&credit.name) {
                bucket.push(credit.name.clone());
            }
        }
    }
    set_list(&mut into.staff.story, &staff.story);
    set_list(&mut into.staff.art, &staff.art);
    set_list(&mut into.staff.translation, &staff.translation);
    set_list(&mut into.staff.lettering, &staff.lettering);
    if let Some(author) = staff.story.first() {
        set_string(&mut into.publisher, author);
    }

    set_cover(&mut into.cover, &record.cover);
    set_string(&mut into.banner_image, &record.banner_image);
    if record.status != SeriesStatus::Unknown {
        into.status = record.status;
    }
    set_date(&mut into.start_date, record.start_date);
    set_date(&mut into.end_date, record.end_date);
    set_number(&mut into.chapters, record.chapters);
    set_number(&mut into.volumes, record.volumes);
    set_list(&mut into.synonyms, &record.synonyms);
    set_list(&mut into.urls, &record.urls);
    if record.format != PublicationFormat::Unknown {
        into.format = record.format;
    }
    set_number(&mut into.average_score, record.average_score);
    set_number(&mut into.mean_score, record.mean_score);
    set_number(&mut into.popularity, record.popularity);
    if record.is_licensed {
        into.is_licensed = true;
    }
    set_number(&mut into.updated_at, record.updated_at);
    set_string(&mut into.country, &record.country);
}

fn fill_string(target: &mut String, value: &str) {
    if target.is_empty() {
        set_string(target, value);
    }
}

fn fill_list<T: Clone>(target: &mut Vec<T>, value: &[T]) {
    if target.is_empty() {
        set_list(target, value);
    }
}

fn fill_number<T: Copy + Default + PartialEq>(target: &mut T, value: T) {
    if *target == T::default() {
        *target = value;
    }
}

/// Fill the empty fields of a primary record from a secondary one.
///
/// The primary identifier and every non-empty primary value are kept.
pub fn fill_record_gaps(primary: &mut CanonicalRecord, secondary: &CanonicalRecord) {
    fill_string(&mut primary.title.romaji, &secondary.title.romaji);
    fill_string(&mut primary.title.english, &secondary.title.english);
    fill_string(&mut primary.title.native, &secondary.title.native);
    fill_string(&mut primary.description, &secondary.description);
    fill_list(&mut primary.genres, &secondary.genres);
    fill_list(&mut primary.tags, &secondary.tags);
    fill_list(&mut primary.staff, &secondary.staff);
    fill_list(&mut primary.characters, &secondary.characters);
    fill_string(&mut primary.cover.extra_large, &secondary.cover.extra_large);
    fill_string(&mut primary.cover.large, &secondary.cover.large);
    fill_string(&mut primary.cover.medium, &secondary.cover.medium);
    fill_string(&mut primary.cover.color, &secondary.cover.color);
    fill_string(&mut primary.banner_image, &secondary.banner_image);
    if primary.status == SeriesStatus::Unknown {
        primary.status = secondary.status;
    }
    if primary.start_date.is_empty() {
        primary.start_date = secondary.start_date;
    }
    if primary.end_date.is_empty() {
        primary.end_date = secondary.end_date;
    }
    fill_number(&mut primary.chapters, secondary.chapters);
    fill_number(&mut primary.volumes, secondary.volumes);
    fill_number(&mut primary.popularity, secondary.popularity);
    fill_number(&mut primary.average_score, secondary.average_score);
    fill_number(&mut primary.mean_score, secondary.mean_score);
    primary.is_licensed |= secondary.is_licensed;
    fill_number(&mut primary.updated_at, secondary.updated_at);
    fill_list(&mut primary.synonyms, &secondary.synonyms);
    fill_list(&mut primary.urls, &secondary.urls);
    if primary.format == PublicationFormat::Unknown {
        primary.format = secondary.format;
    }
    fill_string(&mut primary.country, &secondary.country);
    fill_string(&mut primary.site_url, &secondary.site_url);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogId, RecordId, StaffCredit, Tag, Title};

    fn record(catalog: CatalogId, id: &str) -> CanonicalRecord {
        CanonicalRecord::new(
            RecordId::new(catalog, id),
            Title {
                english: "Monster".to_string(),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_empty_genres_leave_local_value() {
        let mut metadata = SeriesMetadata {
            genres: vec!["Action".to_string()],
            ..Default::default()
        };

        merge_record(&record(CatalogId::AniList, "1"), &mut metadata);
        assert_eq!(metadata.genres, vec!["Action"]);

        let mut drama = record(CatalogId::AniList, "1");
        drama.genres = vec!["Drama".to_string()];
        merge_record(&drama, &mut metadata);
        assert_eq!(metadata.genres, vec!["Drama"]);
    }

    #[test]
    fn test_merge_never_clears_populated_fields() {
        let mut metadata = SeriesMetadata {
            summary: "Doctor Tenma saves a boy.".to_string(),
            status: SeriesStatus::Completed,
            chapters: 162,
            start_date: FuzzyDate {
                year: 1994,
                month: 12,
                day: 5,
            },
            is_licensed: true,
            cover: CoverImage {
                large: "https://img/monster.jpg".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let before = metadata.clone();

        merge_record(&record(CatalogId::MangaDex, "x"), &mut metadata);
        assert_eq!(metadata, before);
    }

    #[test]
    fn test_staff_is_bucketed_by_role() {
        let mut source = record(CatalogId::AniList, "1");
        source.staff = vec![
            StaffCredit {
                role: "Story".to_string(),
                name: "Naoki Urasawa".to_string(),
            },
            StaffCredit {
                role: "Art".to_string(),
                name: "Naoki Urasawa".to_string(),
            },
            StaffCredit {
                role: "Translator".to_string(),
                name: "Camellia Nieh".to_string(),
            },
            StaffCredit {
                role: "Touch-up Art".to_string(),
                name: "Dropped".to_string(),
            },
        ];

        let mut metadata = SeriesMetadata::default();
        merge_record(&source, &mut metadata);

        assert_eq!(metadata.staff.story, vec!["Naoki Urasawa"]);
        assert_eq!(metadata.staff.art, vec!["Naoki Urasawa"]);
        assert_eq!(metadata.staff.translation, vec!["Camellia Nieh"]);
        assert!(metadata.staff.lettering.is_empty());
        assert_eq!(metadata.publisher, "Naoki Urasawa");
    }

    #[test]
    fn test_tags_are_merged_by_name() {
        let mut source = record(CatalogId::AniList, "1");
        source.tags = vec![Tag {
            name: "Psychological".to_string(),
            description: String::new(),
            rank: 90,
        }];

        let mut metadata = SeriesMetadata::default();
        merge_record(&source, &mut metadata);
        assert_eq!(metadata.tags, vec!["Psychological"]);
    }

    #[test]
    fn test_fill_gaps_keeps_primary_values() {
        let mut primary = record(CatalogId::AniList, "1");
        primary.genres = vec!["Mystery".to_string()];
        primary.site_url = "https://anilist.co/manga/1".to_string();

        let mut secondary = record(CatalogId::MangaDex, "md");
        secondary.description = "From the secondary catalog.".to_string();
        secondary.genres = vec!["Horror".to_string()];
        secondary.chapters = 162;
        secondary.urls = vec!["https://mangadex.org/title/md".to_string()];

        fill_record_gaps(&mut primary, &secondary);

        assert_eq!(primary.id, RecordId::new(CatalogId::AniList, "1"));
        assert_eq!(primary.description, "From the secondary catalog.");
        assert_eq!(primary.genres, vec!["Mystery"]);
        assert_eq!(primary.chapters, 162);
        assert_eq!(primary.site_url, "https://anilist.co/manga/1");
        assert_eq!(primary.urls, vec!["https://mangadex.org/title/md"]);
    }

    #[test]
    fn test_fill_gaps_keeps_primary_urls() {
        let mut primary = record(CatalogId::AniList, "1");
        primary.urls = vec!["https://www.viz.com/monster".to_string()];

        let mut secondary = record(CatalogId::MangaDex, "md");
        secondary.urls = vec!["https://mangadex.org/title/md".to_string()];

        fill_record_gaps(&mut primary, &secondary);
        assert_eq!(primary.urls, vec!["https://www.viz.com/monster"]);
    }
}
