//! Fixed category sets for the period event matrix.
//!
//! Every category carries a wire slug, a display label and an ordered list of
//! lowercase keyword fragments. The fragments are matched against event-type
//! display names by the resolver; they are a closed table, never fuzzy.

use serde::de::{self, Deserializer};
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategorySpec {
    pub slug: &'static str,
    pub label: &'static str,
    pub fragments: &'static [&'static str],
}

const fn spec(
    slug: &'static str,
    label: &'static str,
    fragments: &'static [&'static str],
) -> CategorySpec {
    CategorySpec {
        slug,
        label,
        fragments,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PointColumn {
    Score10,
    Score9,
    Score8,
    Score7,
    AverageScore,
    BelowAverage,
    Unprepared,
    Volunteered,
}

// Indexed by discriminant.
const POINT_COLUMN_SPECS: [CategorySpec; 8] = [
    spec("score10", "Score 10", &["score 10", "10 points"]),
    spec("score9", "Score 9", &["score 9", "9 points"]),
    spec("score8", "Score 8", &["score 8", "8 points"]),
    spec("score7", "Score 7", &["score 7", "7 points"]),
    spec("averageScore", "Average score", &["average score", "score 5-6"]),
    spec(
        "belowAverage",
        "Below average score",
        &["below average score", "below average", "weak score"],
    ),
    spec("unprepared", "Unprepared lesson", &["unprepared", "not prepared"]),
    spec("volunteered", "Volunteered answer", &["volunteer", "raised hand"]),
];

impl PointColumn {
    pub const ALL: [PointColumn; 8] = [
        PointColumn::Score10,
        PointColumn::Score9,
        PointColumn::Score8,
        PointColumn::Score7,
        PointColumn::AverageScore,
        PointColumn::BelowAverage,
        PointColumn::Unprepared,
        PointColumn::Volunteered,
    ];

    pub fn spec(self) -> &'static CategorySpec {
        &POINT_COLUMN_SPECS[self as usize]
    }

    /// Built-in scoring table. Zero means "use the catalog default".
    pub fn default_table_points(self) -> i32 {
        match self {
            PointColumn::Score10 => 10,
            PointColumn::Score9 => 8,
            PointColumn::Score8 => 6,
            PointColumn::Score7 => 0,
            PointColumn::AverageScore => 0,
            PointColumn::BelowAverage => -5,
            PointColumn::Unprepared => -5,
            PointColumn::Volunteered => 2,
        }
    }

    /// Only the 10-point column keeps the per-row note as an event description.
    pub fn keeps_note(self) -> bool {
        self == PointColumn::Score10
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LessonRating {
    Excellent,
    Good,
    Fair,
    Average,
    Poor,
}

const LESSON_RATING_SPECS: [CategorySpec; 5] = [
    spec(
        "excellent",
        "Lesson: excellent",
        &["lesson: excellent", "excellent lesson"],
    ),
    spec("good", "Lesson: good", &["lesson: good", "good lesson"]),
    spec("fair", "Lesson: fair", &["lesson: fair", "fair lesson"]),
    spec("average", "Lesson: average", &["lesson: average", "average lesson"]),
    spec("poor", "Lesson: poor", &["lesson: poor", "poor lesson"]),
];

impl LessonRating {
    pub const ALL: [LessonRating; 5] = [
        LessonRating::Excellent,
        LessonRating::Good,
        LessonRating::Fair,
        LessonRating::Average,
        LessonRating::Poor,
    ];

    pub fn spec(self) -> &'static CategorySpec {
        &LESSON_RATING_SPECS[self as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClassViolation {
    NoisyClass,
    LateStart,
    MessyClassroom,
    MissedDuty,
    DisorderlyLineup,
    PhonesInClass,
}

const CLASS_VIOLATION_SPECS: [CategorySpec; 6] = [
    spec("noisyClass", "Noisy class", &["noisy class", "class noisy"]),
    spec("lateStart", "Late start", &["late start", "class started late"]),
    spec(
        "messyClassroom",
        "Messy classroom",
        &["messy classroom", "dirty classroom"],
    ),
    spec("missedDuty", "Missed duty", &["missed duty", "duty roster"]),
    spec(
        "disorderlyLineup",
        "Disorderly lineup",
        &["disorderly lineup", "lineup"],
    ),
    spec("phonesInClass", "Phones in class", &["phones in class"]),
];

impl ClassViolation {
    pub const ALL: [ClassViolation; 6] = [
        ClassViolation::NoisyClass,
        ClassViolation::LateStart,
        ClassViolation::MessyClassroom,
        ClassViolation::MissedDuty,
        ClassViolation::DisorderlyLineup,
        ClassViolation::PhonesInClass,
    ];

    pub fn spec(self) -> &'static CategorySpec {
        &CLASS_VIOLATION_SPECS[self as usize]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StudentViolation {
    // attire
    NoUniform,
    NoBadge,
    NoScarf,
    WrongShoes,
    UntuckedShirt,
    Hairstyle,
    // general conduct
    LateArrival,
    UnexcusedAbsence,
    TalkingInClass,
    PhoneUse,
    Fighting,
    Disrespect,
    NoHomework,
    Littering,
}

const STUDENT_VIOLATION_SPECS: [CategorySpec; 14] = [
    spec("noUniform", "No uniform", &["no uniform", "without uniform"]),
    spec("noBadge", "No badge", &["no badge", "missing badge"]),
    spec("noScarf", "No scarf", &["no scarf", "missing scarf"]),
    spec("wrongShoes", "Wrong shoes", &["wrong shoes", "sandals"]),
    spec("untuckedShirt", "Untucked shirt", &["untucked"]),
    spec("hairstyle", "Improper hairstyle", &["hairstyle", "dyed hair"]),
    spec("lateArrival", "Late arrival", &["late arrival", "arrived late"]),
    spec(
        "unexcusedAbsence",
        "Unexcused absence",
        &["unexcused absence", "absent"],
    ),
    spec("talkingInClass", "Talking in class", &["talking in class", "talking"]),
    spec("phoneUse", "Phone use", &["phone use", "using phone"]),
    spec("fighting", "Fighting", &["fighting"]),
    spec("disrespect", "Disrespect", &["disrespect"]),
    spec("noHomework", "No homework", &["no homework", "missing homework"]),
    spec("littering", "Littering", &["littering"]),
];

impl StudentViolation {
    pub const ALL: [StudentViolation; 14] = [
        StudentViolation::NoUniform,
        StudentViolation::NoBadge,
        StudentViolation::NoScarf,
        StudentViolation::WrongShoes,
        StudentViolation::UntuckedShirt,
        StudentViolation::Hairstyle,
        StudentViolation::LateArrival,
        StudentViolation::UnexcusedAbsence,
        StudentViolation::TalkingInClass,
        StudentViolation::PhoneUse,
        StudentViolation::Fighting,
        StudentViolation::Disrespect,
        StudentViolation::NoHomework,
        StudentViolation::Littering,
    ];

    pub fn spec(self) -> &'static CategorySpec {
        &STUDENT_VIOLATION_SPECS[self as usize]
    }

    pub fn is_attire(self) -> bool {
        matches!(
            self,
            StudentViolation::NoUniform
                | StudentViolation::NoBadge
                | StudentViolation::NoScarf
                | StudentViolation::WrongShoes
                | StudentViolation::UntuckedShirt
                | StudentViolation::Hairstyle
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CategoryFamily {
    Point,
    Lesson,
    ClassViolation,
    StudentViolation,
}

impl CategoryFamily {
    pub fn prefix(self) -> &'static str {
        match self {
            CategoryFamily::Point => "point",
            CategoryFamily::Lesson => "lesson",
            CategoryFamily::ClassViolation => "classViolation",
            CategoryFamily::StudentViolation => "studentViolation",
        }
    }
}

/// Any category a matrix cell can hold. On the wire this is the slug
/// `<family>.<kind>`, e.g. `point.score10` or `classViolation.noisyClass`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CategoryKey {
    Point(PointColumn),
    Lesson(LessonRating),
    ClassViolation(ClassViolation),
    StudentViolation(StudentViolation),
}

impl CategoryKey {
    pub fn all() -> impl Iterator<Item = CategoryKey> {
        PointColumn::ALL
            .into_iter()
            .map(CategoryKey::Point)
            .chain(LessonRating::ALL.into_iter().map(CategoryKey::Lesson))
            .chain(
                ClassViolation::ALL
                    .into_iter()
                    .map(CategoryKey::ClassViolation),
            )
            .chain(
                StudentViolation::ALL
                    .into_iter()
                    .map(CategoryKey::StudentViolation),
            )
    }

    pub fn family(self) -> CategoryFamily {
        match self {
            CategoryKey::Point(_) => CategoryFamily::Point,
            CategoryKey::Lesson(_) => CategoryFamily::Lesson,
            CategoryKey::ClassViolation(_) => CategoryFamily::ClassViolation,
            CategoryKey::StudentViolation(_) => CategoryFamily::StudentViolation,
        }
    }

    pub fn spec(self) -> &'static CategorySpec {
        match self {
            CategoryKey::Point(k) => k.spec(),
            CategoryKey::Lesson(k) => k.spec(),
            CategoryKey::ClassViolation(k) => k.spec(),
            CategoryKey::StudentViolation(k) => k.spec(),
        }
    }

    pub fn label(self) -> &'static str {
        self.spec().label
    }

    pub fn fragments(self) -> &'static [&'static str] {
        self.spec().fragments
    }

    pub fn slug(self) -> String {
        format!("{}.{}", self.family().prefix(), self.spec().slug)
    }

    pub fn parse(raw: &str) -> Option<CategoryKey> {
        let (family, kind) = raw.trim().split_once('.')?;
        match family {
            "point" => PointColumn::ALL
                .into_iter()
                .find(|k| k.spec().slug == kind)
                .map(CategoryKey::Point),
            "lesson" => LessonRating::ALL
                .into_iter()
                .find(|k| k.spec().slug == kind)
                .map(CategoryKey::Lesson),
            "classViolation" => ClassViolation::ALL
                .into_iter()
                .find(|k| k.spec().slug == kind)
                .map(CategoryKey::ClassViolation),
            "studentViolation" => StudentViolation::ALL
                .into_iter()
                .find(|k| k.spec().slug == kind)
                .map(CategoryKey::StudentViolation),
            _ => None,
        }
    }
}

impl fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.slug())
    }
}

impl Serialize for CategoryKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.slug())
    }
}

impl<'de> Deserialize<'de> for CategoryKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CategoryKey::parse(&raw)
            .ok_or_else(|| de::Error::custom(format!("unknown category key: {}", raw)))
    }
}

/// Catalog row as exposed to the presentation layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDescriptor {
    pub key: CategoryKey,
    pub family: CategoryFamily,
    pub label: &'static str,
    pub fragments: &'static [&'static str],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attire: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table_points: Option<i32>,
}

pub fn describe_all() -> Vec<CategoryDescriptor> {
    CategoryKey::all()
        .map(|key| CategoryDescriptor {
            key,
            family: key.family(),
            label: key.label(),
            fragments: key.fragments(),
            attire: match key {
                CategoryKey::StudentViolation(k) => Some(k.is_attire()),
                _ => None,
            },
            table_points: match key {
                CategoryKey::Point(k) => Some(k.default_table_points()),
                _ => None,
            },
        })
        .collect()
}
