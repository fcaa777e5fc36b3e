use ratecard::{NodeSummary, Outcome, ParseDetails, PriceResult, ResolutionFailure, ServiceInfo};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

/// One line per query: the price or the failure message.
pub fn print_outcome(input: &str, outcome: &Outcome, color: bool) {
    let palette = ansi::Palette::new(color);
    match outcome {
        Ok(found) => print_price(input, found, &palette),
        Err(failure) => print_failure(input, failure, &palette),
    }
}

fn print_price(input: &str, found: &PriceResult, palette: &ansi::Palette) {
    println!(
        "{} {} {} {}",
        palette.dim(format!("{input} →")),
        palette.bold(palette.paint(format!("${} {}", found.price, found.currency), ansi::GREEN)),
        palette.dim("│"),
        palette.paint(format!("{}, {}, {}", found.service, found.zone, found.weight), ansi::CYAN),
    );
    if let Some(source) = &found.source_document {
        println!("    {} {}", palette.dim("source:"), palette.dim(source));
    }
    if found.is_best_effort() {
        println!(
            "    {}",
            palette.paint(format!("note: no service named, used first loaded service '{}'", found.service), ansi::YELLOW)
        );
    }
}

fn print_failure(input: &str, failure: &ResolutionFailure, palette: &ansi::Palette) {
    println!(
        "{} {} {}",
        palette.dim(format!("{input} →")),
        palette.paint(format!("[{}]", failure.kind().as_str()), ansi::RED),
        failure,
    );
}

pub fn print_explain(input: &str, details: &ParseDetails, outcome: &Outcome, color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Query: \"{}\"", input), ansi::CYAN)));

    println!("\n{}", palette.paint("━━━ Saturation ━━━", ansi::GRAY));
    print_saturation(details, &palette);

    println!("\n{}", palette.paint("━━━ Candidates ━━━", ansi::GRAY));
    if details.candidates.is_empty() {
        println!("{}", palette.dim("  No tokens produced"));
        println!("\n{}", palette.paint("Possible reasons:", ansi::YELLOW));
        println!("  • No zone marker ('zone 5', 'z5') or unit ('lb', 'pounds') in the query");
        println!("  • The query was rejected before parsing (empty or too long)");
    } else {
        print_candidates(details, &palette);
    }

    println!("\n{}", palette.paint("━━━ Outcome ━━━", ansi::GRAY));
    match outcome {
        Ok(found) => print_price(input, found, &palette),
        Err(failure) => print_failure(input, failure, &palette),
    }

    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!(
        "  Total: {}  │  Saturation: {}  │  Select: {}  │  Assemble: {}",
        palette.paint(format!("{:?}", details.total), ansi::GREEN),
        palette.paint(format!("{:?}", details.saturation_total), ansi::CYAN),
        palette.dim(format!("{:?}", details.select)),
        palette.dim(format!("{:?}", details.assemble)),
    );
    println!();
}

fn print_saturation(details: &ParseDetails, palette: &ansi::Palette) {
    println!("  {} {}", palette.dim("active rules:"), palette.paint(details.active_rules.join(", "), ansi::BLUE));
    for pass in &details.saturation {
        let label = if pass.pass == 0 { "Pass 0 (regex):".to_string() } else { format!("Pass {}:", pass.pass) };

        println!(
            "  {} {}",
            palette.paint(label, ansi::BLUE),
            if pass.produced > 0 {
                palette.paint(format!("✓ {} tokens", pass.produced), ansi::GREEN)
            } else {
                palette.dim(format!("✗ {} tokens", pass.produced))
            }
        );

        for node in pass.samples.iter().take(5) {
            println!("    {}", fmt_node_compact(node, palette));
        }
        if pass.samples.len() > 5 {
            println!("    {}", palette.dim(format!("... +{} more", pass.samples.len() - 5)));
        }
    }
}

fn print_candidates(details: &ParseDetails, palette: &ansi::Palette) {
    for (idx, ent) in details.candidates.iter().enumerate() {
        println!(
            "  {} {} {} {}",
            palette.paint(format!("[{}]", idx), ansi::GRAY),
            palette.bold(palette.paint(&ent.value, ansi::GREEN)),
            palette.dim("│"),
            palette.paint(format!("span {}..{} \"{}\"", ent.start, ent.end, ent.body), ansi::YELLOW),
        );
        println!(
            "      {} {}  {} {}",
            palette.dim("dim:"),
            palette.paint(ent.name, ansi::BLUE),
            palette.dim("│ rule:"),
            palette.paint(ent.rule, ansi::CYAN)
        );
    }
}

pub fn print_services(services: &[ServiceInfo], color: bool) {
    let palette = ansi::Palette::new(color);
    if services.is_empty() {
        println!("{}", palette.dim("No services loaded"));
        return;
    }
    for svc in services {
        let zones = svc.zones.iter().map(u32::to_string).collect::<Vec<_>>().join(",");
        println!(
            "{} {} {}",
            palette.bold(palette.paint(&svc.name, ansi::CYAN)),
            palette.dim("│"),
            palette.dim(format!(
                "zones {zones}  weights {}..{}  {} rates",
                svc.min_weight, svc.max_weight, svc.rates
            )),
        );
        if !svc.aliases.is_empty() {
            println!("    {} {}", palette.dim("aliases:"), svc.aliases.join(", "));
        }
        if let Some(source) = &svc.source {
            println!("    {} {}", palette.dim("source:"), palette.dim(source));
        }
    }
}

fn fmt_node_compact(node: &NodeSummary, palette: &ansi::Palette) -> String {
    format!(
        "{} {} {}",
        palette.paint(format!("{}..{}", node.start, node.end), ansi::YELLOW),
        palette.paint(node.rule, ansi::BLUE),
        palette.dim(node.preview.clone())
    )
}
