use engram::privacy::PrivacyAnalyzer;

/// Print the privacy classification of a piece of text.
pub fn classify(text: &str, sanitize: bool) {
    let analyzer = PrivacyAnalyzer::new();
    let analysis = analyzer.analyze(text, None);

    println!("Level:               {}", analysis.level);
    println!("Score:               {:.2}", analysis.score);
    println!("Confidence:          {:.2}", analysis.confidence);
    println!("Requires on-device:  {}", analysis.requires_on_device);
    if !analysis.personal_indicators.is_empty() {
        println!("Personal indicators: {}", analysis.personal_indicators.join(", "));
    }
    if !analysis.sensitive_entities.is_empty() {
        println!("Sensitive terms:     {}", analysis.sensitive_entities.join(", "));
    }
    if !analysis.risk_factors.is_empty() {
        let risks: Vec<String> = analysis
            .risk_factors
            .iter()
            .map(|r| format!("{r:?}").to_lowercase())
            .collect();
        println!("Risk factors:        {}", risks.join(", "));
    }
    if sanitize {
        println!("Sanitized:           {}", analyzer.sanitize_query(text));
    }
}
