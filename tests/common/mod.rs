//! Shared fixtures for the integration tests
//!
//! Writes small labelled corpora in both supported CSV layouts and trains
//! a detector on them.

#![allow(dead_code)]

use spam_detector::{
    ml::{CorpusFormat, DatasetConfig, SpamDetector, TrainingConfig, TrainingPipeline},
    nlp::TextNormalizer,
};
use std::path::Path;

pub const SPAM_MESSAGES: [&str; 12] = [
    "WINNER!! You have won a $1000 prize! Call 123-456-7890 now!",
    "FREE entry to win a cash prize! Text WIN to 80086 now",
    "Congratulations! You've been selected for a FREE iPhone, claim now",
    "URGENT: Your account will be suspended. Call now to claim your refund",
    "Get 50% OFF on all products! Limited time offer, call 999-888-7777",
    "You have won a free holiday! Claim your prize at www.prize.biz",
    "Cash prize waiting for you, reply CLAIM to collect",
    "Exclusive offer: win a brand new car, text WIN today",
    "Free ringtones! Text TONES now to claim your free gift",
    "Claim your free vouchers now, limited offer for winners",
    "You are a winner! Call now to collect your cash reward",
    "Win $500 gift cards, click http://win.example.com now",
];

pub const HAM_MESSAGES: [&str; 18] = [
    "Hey, are we still meeting for lunch tomorrow at 2pm?",
    "Thanks for the meeting. I'll send the report by Friday.",
    "Can you pick up some milk on the way home?",
    "See you at the office tomorrow morning",
    "Running late, please start the meeting without me",
    "Dinner at mum's place on Sunday?",
    "The report looks good, thanks for the quick turnaround",
    "Let's catch up over coffee next week",
    "Happy birthday! Hope you have a great day",
    "Did you finish the project slides for the review?",
    "Call me when you get home tonight",
    "Lunch at noon works for me",
    "The meeting moved to the afternoon",
    "Please review the attached document before Monday",
    "I left the keys on the kitchen table",
    "Are you coming to the team dinner tonight?",
    "Thanks for your help with the presentation yesterday",
    "Can we reschedule our call to Thursday?",
];

fn csv_field(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\"\""))
}

/// Email layout: `Category,Message`
pub fn write_email_corpus(path: &Path, spam: &[&str], ham: &[&str]) {
    let mut out = String::from("Category,Message\n");
    for text in ham {
        out.push_str(&format!("ham,{}\n", csv_field(text)));
    }
    for text in spam {
        out.push_str(&format!("spam,{}\n", csv_field(text)));
    }
    std::fs::write(path, out).unwrap();
}

/// SMS layout: `v1,v2` plus empty trailing columns
pub fn write_sms_corpus(path: &Path, spam: &[&str], ham: &[&str]) {
    let mut out = String::from("v1,v2,,,\n");
    for text in spam {
        out.push_str(&format!("spam,{},,,\n", csv_field(text)));
    }
    for text in ham {
        out.push_str(&format!("ham,{},,,\n", csv_field(text)));
    }
    std::fs::write(path, out).unwrap();
}

/// Write both corpora into `dir`, splitting the fixtures between them
pub fn write_corpora(dir: &Path) -> Vec<DatasetConfig> {
    let email = dir.join("email.csv");
    let sms = dir.join("spam.csv");
    write_email_corpus(&email, &SPAM_MESSAGES[..6], &HAM_MESSAGES[..9]);
    write_sms_corpus(&sms, &SPAM_MESSAGES[6..], &HAM_MESSAGES[9..]);

    vec![
        DatasetConfig {
            path: email,
            format: CorpusFormat::Email,
        },
        DatasetConfig {
            path: sms,
            format: CorpusFormat::Sms,
        },
    ]
}

pub fn training_config(datasets: Vec<DatasetConfig>) -> TrainingConfig {
    TrainingConfig {
        datasets,
        ..TrainingConfig::default()
    }
}

/// Train a detector on the fixture corpora
pub fn trained_detector(dir: &Path) -> SpamDetector {
    let normalizer = TextNormalizer::english().unwrap();
    let pipeline = TrainingPipeline::new(normalizer.clone(), training_config(write_corpora(dir)));
    let model = pipeline.run_from_config().unwrap();
    SpamDetector::new(normalizer, model.vectorizer, model.classifier).unwrap()
}
