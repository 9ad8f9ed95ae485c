//! `Accept` header negotiation.

use mime::Mime;

const SHORTHANDS: &[(&str, &str)] = &[
    ("json", "application/json"),
    ("html", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("javascript", "application/javascript"),
    ("svg", "image/svg+xml"),
    ("png", "image/png"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
];

struct AcceptRange {
    mime: Mime,
    quality: f32,
}

/// How well a candidate fits: `(quality, specificity, position of the accept range)`.
#[derive(Clone, Copy)]
struct Fitness {
    quality: f32,
    specificity: u8,
    position: usize,
}

impl Fitness {
    fn beats(self, other: Self) -> bool {
        if (self.quality - other.quality).abs() > f32::EPSILON {
            return self.quality > other.quality;
        }
        if self.specificity != other.specificity {
            return self.specificity > other.specificity;
        }
        self.position < other.position
    }
}

pub(super) fn preferred<'t>(accept: Option<&str>, types: &[&'t str]) -> Option<&'t str> {
    let accept = accept.map(str::trim).filter(|accept| !accept.is_empty());
    let Some(accept) = accept else {
        return types.first().copied();
    };

    let ranges = parse_accept(accept);
    let mut best: Option<(&'t str, Fitness)> = None;

    for candidate in types {
        let Some(mime) = resolve(candidate) else {
            continue;
        };
        let Some(fitness) = fitness(&mime, &ranges) else {
            continue;
        };
        if fitness.quality <= 0.0 {
            continue;
        }
        match best {
            Some((_, current)) if !fitness.beats(current) => {}
            _ => best = Some((candidate, fitness)),
        }
    }

    best.map(|(candidate, _)| candidate)
}

fn parse_accept(accept: &str) -> Vec<AcceptRange> {
    accept
        .split(',')
        .filter_map(|range| range.trim().parse::<Mime>().ok())
        .map(|mime| {
            let quality = mime.get_param("q").and_then(|q| q.as_str().parse::<f32>().ok()).unwrap_or(1.0);
            AcceptRange { mime, quality }
        })
        .collect()
}

fn resolve(candidate: &str) -> Option<Mime> {
    let full = if candidate.contains('/') {
        candidate
    } else {
        let shorthand = candidate.to_ascii_lowercase();
        SHORTHANDS.iter().find(|(name, _)| *name == shorthand).map(|(_, full)| *full)?
    };
    full.parse().ok()
}

/// The most specific range matching `mime` decides its quality.
fn fitness(mime: &Mime, ranges: &[AcceptRange]) -> Option<Fitness> {
    let mut found: Option<Fitness> = None;
    for (position, range) in ranges.iter().enumerate() {
        let Some(specificity) = specificity(mime, &range.mime) else {
            continue;
        };
        let candidate = Fitness { quality: range.quality, specificity, position };
        match found {
            Some(current) if current.specificity >= specificity => {}
            _ => found = Some(candidate),
        }
    }
    found
}

fn specificity(mime: &Mime, range: &Mime) -> Option<u8> {
    if range.type_() == mime::STAR {
        return Some(0);
    }
    if range.type_() != mime.type_() {
        return None;
    }
    if range.subtype() == mime::STAR {
        return Some(1);
    }
    (range.subtype() == mime.subtype() && range.suffix() == mime.suffix()).then_some(2)
}
