//! Notification composer: turns a lifecycle event plus meeting metadata into a localized email.
//!
//! When the meeting came from the Moodle plugin (either `bbb-origin-server-name` or `bbb-context` is
//! present) the body opens with the institution header and a link to the course page. Otherwise it
//! opens with a generic English sentence naming the meeting.
//!
//! The plain-text part is rendered without escaping. The HTML part escapes every value taken from
//! the metadata; directories and the playback URL come from configuration and are inserted as-is.

use std::sync::LazyLock;

use handlebars::Handlebars;
use regex::Regex;
use serde::Serialize;

use crate::config::{Locale, MailConfig};
use crate::error::{Error, Result};
use crate::message::NotificationMessage;
use crate::metadata::{self, Metadata};
use crate::stage::{Stage, StageEvent};

static COURSE_ID: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^[^-]+-(?P<course_id>\d+)(?:-|$)").expect("course id pattern is valid"));

// ============================================================================
// Templates
// ============================================================================

const GENERIC_HEADER: &str = "header.generic";
const COURSE_HEADER: &str = "header.course";

struct Templates {
  generic_header: &'static str,
  course_header: &'static str,
  archived_body: &'static str,
  processed_body: &'static str,
  published_body: &'static str,
  archived_subject: &'static str,
  processed_subject: &'static str,
  published_subject: &'static str,
}

const ZH_TW: Templates = Templates {
  generic_header: "The meeting {{display_name}}",
  course_header: "[{{server_name}}] - 同步教室  - 課程: <a href='https://{{server_name}}/course/view.php?id={{course_id}}' >{{display_name}}</a>",
  archived_body: "{{{header}}} 所有人都已離開目前議程, 開始進行封存.<br/>封存檔案將會在 {{{files_dir}}} 目錄內.",
  processed_body: "{{{header}}} 開始進行轉檔處理, 請稍候.<br/>處理過的檔案將會在 {{{files_dir}}} 目錄內.",
  published_body: "{{{header}}} 已經轉檔完成.<br/>轉檔後錄影檔案在 {{{files_dir}}} 目錄內.<br/>錄影播放連結:{{{playback_url}}}",
  archived_subject: "同步教室 {{display_name}} 議程結束-開始進行封存",
  processed_subject: "同步教室 {{display_name}} 開始進行轉檔",
  published_subject: "同步教室 {{display_name}} 轉檔完成",
};

const EN: Templates = Templates {
  generic_header: "The meeting {{display_name}}",
  course_header: "[{{server_name}}] - Virtual classroom  - Course: <a href='https://{{server_name}}/course/view.php?id={{course_id}}' >{{display_name}}</a>",
  archived_body: "{{{header}}} has ended and everyone has left; archiving has begun.<br/>Archived files will be in {{{files_dir}}}.",
  processed_body: "{{{header}}} is being transcoded, please wait.<br/>Processed files will be in {{{files_dir}}}.",
  published_body: "{{{header}}} has finished transcoding.<br/>Recording files are in {{{files_dir}}}.<br/>Playback link: {{{playback_url}}}",
  archived_subject: "Virtual classroom {{display_name}} ended - archiving started",
  processed_subject: "Virtual classroom {{display_name}} transcoding started",
  published_subject: "Virtual classroom {{display_name}} transcoding complete",
};

impl Templates {
  fn for_locale(locale: Locale) -> &'static Templates {
    match locale {
      Locale::ZhTw => &ZH_TW,
      Locale::En => &EN,
    }
  }

  fn register(&self, registry: &mut Handlebars<'static>) -> Result<()> {
    let entries = [
      (GENERIC_HEADER.to_string(), self.generic_header),
      (COURSE_HEADER.to_string(), self.course_header),
      (body_template(Stage::Archived), self.archived_body),
      (body_template(Stage::Processed), self.processed_body),
      (body_template(Stage::Published), self.published_body),
      (subject_template(Stage::Archived), self.archived_subject),
      (subject_template(Stage::Processed), self.processed_subject),
      (subject_template(Stage::Published), self.published_subject),
    ];
    for (name, template) in entries {
      registry
        .register_template_string(&name, template)
        .map_err(|e| Error::Template(format!("registering {name}: {e}")))?;
    }
    Ok(())
  }
}

fn body_template(stage: Stage) -> String {
  format!("body.{stage}")
}

fn subject_template(stage: Stage) -> String {
  format!("subject.{stage}")
}

// ============================================================================
// Meeting Context
// ============================================================================

/// Display name: `meetingName`, then `title`, then the meeting id
pub fn display_name<'a>(meeting_id: &'a str, metadata: &'a Metadata) -> &'a str {
  metadata
    .get(metadata::MEETING_NAME)
    .or_else(|| metadata.get(metadata::TITLE))
    .unwrap_or(meeting_id)
}

/// Course id embedded in a Moodle meeting id (`{hash}-{course_id}-...`)
pub fn parse_course_id(meeting_id: &str) -> Result<&str> {
  COURSE_ID
    .captures(meeting_id)
    .and_then(|captures| captures.name("course_id"))
    .map(|m| m.as_str())
    .ok_or_else(|| Error::InvalidMeetingId(meeting_id.to_string()))
}

/// Moodle course the meeting belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CourseLink<'a> {
  pub server_name: &'a str,
  pub course_name: &'a str,
  pub course_id: &'a str,
}

impl<'a> CourseLink<'a> {
  /// `None` when neither the origin server nor the course context is known.
  ///
  /// Either field alone is enough to select the course header.
  pub fn from_metadata(metadata: &'a Metadata) -> Result<Option<Self>> {
    let server_name = metadata.get(metadata::ORIGIN_SERVER_NAME);
    let course_name = metadata.get(metadata::CONTEXT);
    if server_name.is_none() && course_name.is_none() {
      return Ok(None);
    }

    let meeting_id = metadata
      .get(metadata::MEETING_ID)
      .ok_or(Error::MissingField(metadata::MEETING_ID))?;

    Ok(Some(Self {
      server_name: server_name.unwrap_or_default(),
      course_name: course_name.unwrap_or_default(),
      course_id: parse_course_id(meeting_id)?,
    }))
  }

  pub fn url(&self) -> String {
    format!("https://{}/course/view.php?id={}", self.server_name, self.course_id)
  }
}

#[derive(Serialize)]
struct TemplateData<'a> {
  display_name: &'a str,
  server_name: &'a str,
  course_id: &'a str,
  files_dir: String,
  playback_url: &'a str,
  header: String,
}

// ============================================================================
// Composer
// ============================================================================

/// Renders notifications for one locale and envelope
pub struct Composer {
  sender: String,
  recipient: String,
  subject_prefix: String,
  text: Handlebars<'static>,
  html: Handlebars<'static>,
}

impl Composer {
  pub fn new(mail: &MailConfig) -> Result<Self> {
    let templates = Templates::for_locale(mail.locale);

    let mut text = Handlebars::new();
    text.set_strict_mode(true);
    text.register_escape_fn(handlebars::no_escape);
    templates.register(&mut text)?;

    let mut html = Handlebars::new();
    html.set_strict_mode(true);
    templates.register(&mut html)?;

    Ok(Self {
      sender: mail.sender.clone(),
      recipient: mail.recipient.clone(),
      subject_prefix: mail.subject_prefix.clone(),
      text,
      html,
    })
  }

  /// Compose the notification for `event`. Pure: the same inputs give the same message.
  pub fn compose(&self, event: &StageEvent, meeting_id: &str, metadata: &Metadata) -> Result<NotificationMessage> {
    let stage = event.stage();
    let course = CourseLink::from_metadata(metadata)?;

    let name = display_name(meeting_id, metadata);
    let (header, display_name) = match course {
      Some(ref course) => (COURSE_HEADER, format!("{} - {}", course.course_name, name)),
      None => (GENERIC_HEADER, name.to_string()),
    };

    let mut data = TemplateData {
      display_name: &display_name,
      server_name: course.as_ref().map(|c| c.server_name).unwrap_or_default(),
      course_id: course.as_ref().map(|c| c.course_id).unwrap_or_default(),
      files_dir: event.files_dir().display().to_string(),
      playback_url: event.playback_url().unwrap_or_default(),
      header: String::new(),
    };

    let subject = format!(
      "{}{}",
      self.subject_prefix,
      render(&self.text, &subject_template(stage), &data)?
    );

    data.header = render(&self.text, header, &data)?;
    let text_body = render(&self.text, &body_template(stage), &data)?;

    data.header = render(&self.html, header, &data)?;
    let html_body = render(&self.html, &body_template(stage), &data)?;

    Ok(NotificationMessage {
      recipient: self.recipient.clone(),
      sender: self.sender.clone(),
      subject,
      text_body,
      html_body,
    })
  }
}

fn render(registry: &Handlebars<'static>, name: &str, data: &TemplateData<'_>) -> Result<String> {
  registry
    .render(name, data)
    .map_err(|e| Error::Template(format!("rendering {name}: {e}")))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::RecordingConfig;
  use crate::metadata::{CONTEXT, MEETING_ID, MEETING_NAME, ORIGIN_SERVER_NAME, TITLE};
  use std::path::PathBuf;

  const FALLBACK_PREFIX: &str = "The meeting ";

  fn composer(locale: Locale) -> Composer {
    Composer::new(&MailConfig {
      sender: "Lingo <lingo@example.edu>".to_string(),
      recipient: "rd@example.edu".to_string(),
      subject_prefix: "[Lingo]".to_string(),
      locale,
    })
    .unwrap()
  }

  fn published(playback_url: &str) -> StageEvent {
    StageEvent::Published {
      published_dir: PathBuf::from("/var/bigbluebutton/published/presentation/abc-42-xyz-1"),
      playback_url: playback_url.to_string(),
    }
  }

  fn all_events(meeting_id: &str) -> Vec<StageEvent> {
    Stage::ALL
      .iter()
      .map(|stage| StageEvent::for_meeting(*stage, meeting_id, &RecordingConfig::default()).unwrap())
      .collect()
  }

  fn moodle_metadata() -> Metadata {
    Metadata::from_pairs([
      (MEETING_NAME, "Algebra 101"),
      (CONTEXT, "MATH101"),
      (ORIGIN_SERVER_NAME, "school.example.edu"),
      (MEETING_ID, "abc-42-xyz"),
    ])
  }

  #[test]
  fn test_moodle_published_scenario() {
    let playback = "https://host/play?id=abc-42-xyz-1";
    let metadata = moodle_metadata();
    assert_eq!(parse_course_id(metadata.get(MEETING_ID).unwrap()).unwrap(), "42");

    let message = composer(Locale::ZhTw)
      .compose(&published(playback), "abc-42-xyz-1", &metadata)
      .unwrap();

    assert!(message.subject.contains("Algebra 101"));
    assert!(message.subject.starts_with("[Lingo]"));
    for body in [&message.text_body, &message.html_body] {
      assert!(body.contains("href='https://school.example.edu/course/view.php?id=42'"));
      assert!(body.contains(playback), "playback URL must appear verbatim: {body}");
    }
    assert_eq!(
      message.text_body,
      "[school.example.edu] - 同步教室  - 課程: <a href='https://school.example.edu/course/view.php?id=42' >MATH101 - Algebra 101</a> \
       已經轉檔完成.<br/>轉檔後錄影檔案在 /var/bigbluebutton/published/presentation/abc-42-xyz-1 目錄內.\
       <br/>錄影播放連結:https://host/play?id=abc-42-xyz-1"
    );
    assert_eq!(message.subject, "[Lingo]同步教室 MATH101 - Algebra 101 轉檔完成");
    assert_eq!(message.recipient, "rd@example.edu");
    assert_eq!(message.sender, "Lingo <lingo@example.edu>");
  }

  #[test]
  fn test_empty_metadata_archived_scenario() {
    let event = StageEvent::for_meeting(Stage::Archived, "m1", &RecordingConfig::default()).unwrap();
    let message = composer(Locale::ZhTw).compose(&event, "m1", &Metadata::default()).unwrap();

    assert!(message.text_body.starts_with("The meeting m1 "));
    assert!(message.html_body.starts_with("The meeting m1 "));
    assert!(!message.text_body.contains("<a "));
    assert!(!message.html_body.contains("<a "));
    assert!(message.text_body.contains("/var/bigbluebutton/recording/raw/m1"));
    assert_eq!(message.subject, "[Lingo]同步教室 m1 議程結束-開始進行封存");
  }

  #[test]
  fn test_fallback_branch_without_moodle_keys() {
    let metadata = Metadata::from_pairs([(MEETING_NAME, "Weekly sync"), (MEETING_ID, "abc-42-xyz")]);
    for locale in [Locale::ZhTw, Locale::En] {
      for event in all_events("m1") {
        let message = composer(locale).compose(&event, "m1", &metadata).unwrap();
        assert!(message.text_body.starts_with(&format!("{FALLBACK_PREFIX}Weekly sync")));
        assert!(!message.text_body.contains("<a "));
        assert!(!message.html_body.contains("<a "));
      }
    }
  }

  #[test]
  fn test_either_moodle_key_selects_course_header() {
    let only_context = Metadata::from_pairs([(CONTEXT, "MATH101"), (MEETING_ID, "abc-42-xyz")]);
    let only_server = Metadata::from_pairs([(ORIGIN_SERVER_NAME, "school.example.edu"), (MEETING_ID, "abc-42-xyz")]);

    for metadata in [only_context, only_server, moodle_metadata()] {
      for event in all_events("m1") {
        let message = composer(Locale::ZhTw).compose(&event, "m1", &metadata).unwrap();
        for body in [&message.text_body, &message.html_body] {
          assert!(!body.starts_with(FALLBACK_PREFIX));
          assert!(body.contains("<a href='https://"), "missing course link: {body}");
        }
      }
    }
  }

  #[test]
  fn test_only_server_name_keeps_legacy_display_name() {
    let metadata = Metadata::from_pairs([
      (ORIGIN_SERVER_NAME, "school.example.edu"),
      (MEETING_ID, "abc-7"),
      (TITLE, "Lab"),
    ]);
    let event = StageEvent::for_meeting(Stage::Processed, "m1", &RecordingConfig::default()).unwrap();
    let message = composer(Locale::ZhTw).compose(&event, "m1", &metadata).unwrap();
    assert!(message.text_body.starts_with("[school.example.edu] - 同步教室 "));
    assert!(message.text_body.contains("> - Lab</a>"));
    assert!(message.text_body.contains("view.php?id=7'"));
  }

  #[test]
  fn test_display_name_precedence() {
    let cases = [
      (vec![(MEETING_NAME, "Name"), (TITLE, "Title")], "Name"),
      (vec![(MEETING_NAME, "Name")], "Name"),
      (vec![(TITLE, "Title")], "Title"),
      (vec![], "m1"),
    ];
    for (pairs, expected) in cases {
      let metadata = Metadata::from_pairs(pairs);
      assert_eq!(display_name("m1", &metadata), expected);

      let event = StageEvent::for_meeting(Stage::Processed, "m1", &RecordingConfig::default()).unwrap();
      let message = composer(Locale::En).compose(&event, "m1", &metadata).unwrap();
      assert!(message.text_body.starts_with(&format!("{FALLBACK_PREFIX}{expected} ")));
      assert!(message.subject.contains(expected));
    }
  }

  #[test]
  fn test_empty_meeting_name_is_still_present() {
    let metadata = Metadata::from_pairs([(MEETING_NAME, ""), (TITLE, "Title")]);
    assert_eq!(display_name("m1", &metadata), "");
  }

  #[test]
  fn test_playback_url_only_for_published() {
    let playback = RecordingConfig::default().playback_url_for("m1");
    for locale in [Locale::ZhTw, Locale::En] {
      for event in all_events("m1") {
        let message = composer(locale).compose(&event, "m1", &Metadata::default()).unwrap();
        let included = message.text_body.contains(&playback) && message.html_body.contains(&playback);
        let mentioned = message.text_body.contains("playback.html") || message.html_body.contains("playback.html");
        if event.stage() == Stage::Published {
          assert!(included, "published body must carry the playback URL");
        } else {
          assert!(!mentioned, "{} body must not carry a playback URL", event.stage());
        }
      }
    }
  }

  #[test]
  fn test_compose_is_idempotent() {
    let composer = composer(Locale::ZhTw);
    let metadata = moodle_metadata();
    for event in all_events("abc-42-xyz-1") {
      let first = composer.compose(&event, "abc-42-xyz-1", &metadata).unwrap();
      let second = composer.compose(&event, "abc-42-xyz-1", &metadata).unwrap();
      assert_eq!(first, second);
    }
  }

  #[test]
  fn test_html_part_escapes_metadata() {
    let metadata = Metadata::from_pairs([
      (MEETING_NAME, "<script>alert(1)</script>"),
      (CONTEXT, "R&D"),
      (MEETING_ID, "abc-42-xyz"),
    ]);
    let message = composer(Locale::En)
      .compose(&published("https://host/play?id=1&x=2"), "m1", &metadata)
      .unwrap();

    assert!(message.text_body.contains("R&D - <script>alert(1)</script>"));
    assert!(!message.html_body.contains("<script>"));
    assert!(message.html_body.contains("&lt;script&gt;"));
    assert!(message.html_body.contains("R&amp;D"));
    // Configured values are not escaped
    assert!(message.html_body.contains("https://host/play?id=1&x=2"));
  }

  #[test]
  fn test_invalid_course_meeting_id_fails() {
    for meeting_id in ["abc", "abc-", "abc-course-1", "-42"] {
      let metadata = Metadata::from_pairs([(CONTEXT, "MATH101"), (MEETING_ID, meeting_id)]);
      let event = StageEvent::for_meeting(Stage::Archived, "m1", &RecordingConfig::default()).unwrap();
      let err = composer(Locale::ZhTw).compose(&event, "m1", &metadata).unwrap_err();
      assert!(matches!(err, Error::InvalidMeetingId(_)), "{meeting_id}: {err:?}");
    }
  }

  #[test]
  fn test_missing_meeting_id_in_course_branch_fails() {
    let metadata = Metadata::from_pairs([(CONTEXT, "MATH101")]);
    let event = StageEvent::for_meeting(Stage::Archived, "m1", &RecordingConfig::default()).unwrap();
    let err = composer(Locale::ZhTw).compose(&event, "m1", &metadata).unwrap_err();
    assert!(matches!(err, Error::MissingField(MEETING_ID)));
  }

  #[test]
  fn test_course_id_parsing() {
    assert_eq!(parse_course_id("abc-42-xyz").unwrap(), "42");
    assert_eq!(parse_course_id("abc-42").unwrap(), "42");
    assert_eq!(parse_course_id("760cca8b-1586392892643").unwrap(), "1586392892643");
    assert!(parse_course_id("abc-4x2-xyz").is_err());
  }

  #[test]
  fn test_course_link_url() {
    let metadata = moodle_metadata();
    let course = CourseLink::from_metadata(&metadata).unwrap().unwrap();
    assert_eq!(course.url(), "https://school.example.edu/course/view.php?id=42");
    assert_eq!(course.course_name, "MATH101");
  }

  #[test]
  fn test_english_locale() {
    let event = StageEvent::for_meeting(Stage::Processed, "m1", &RecordingConfig::default()).unwrap();
    let message = composer(Locale::En).compose(&event, "m1", &moodle_metadata()).unwrap();
    assert!(message.text_body.starts_with("[school.example.edu] - Virtual classroom  - Course: "));
    assert_eq!(message.subject, "[Lingo]Virtual classroom MATH101 - Algebra 101 transcoding started");
  }
}
