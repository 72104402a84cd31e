//! Treatment advice
//!
//! Static advice for every class the classifier can produce, in English and
//! Sinhala. Lookups never fail: unknown labels get a fallback entry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::CLASS_NAMES;

/// Advice for one class, as ordered lines per language
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treatment {
    pub english: Vec<String>,
    pub sinhala: Vec<String>,
}

impl Treatment {
    fn from_lines(english: &[&str], sinhala: &[&str]) -> Self {
        Self {
            english: english.iter().map(|s| s.to_string()).collect(),
            sinhala: sinhala.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Entry returned for labels with no advice
    pub fn fallback() -> Self {
        Self::from_lines(&["No treatment available"], &["චිකිත්සා ලබා නොමැත"])
    }

    pub fn is_empty(&self) -> bool {
        self.english.is_empty() && self.sinhala.is_empty()
    }
}

/// Label to advice lookup, fixed at construction
#[derive(Debug, Clone)]
pub struct TreatmentCatalog {
    entries: HashMap<String, Treatment>,
    fallback: Treatment,
}

impl Default for TreatmentCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TreatmentCatalog {
    /// Catalog covering every label in [`CLASS_NAMES`]
    pub fn new() -> Self {
        let [sigatoka, healthy, panama] = CLASS_NAMES;
        let entries = HashMap::from([
            (
                sigatoka.to_string(),
                Treatment::from_lines(BLACK_SIGATOKA_ENGLISH, BLACK_SIGATOKA_SINHALA),
            ),
            (
                healthy.to_string(),
                Treatment::from_lines(HEALTHY_ENGLISH, HEALTHY_SINHALA),
            ),
            (
                panama.to_string(),
                Treatment::from_lines(PANAMA_ENGLISH, PANAMA_SINHALA),
            ),
        ]);

        Self {
            entries,
            fallback: Treatment::fallback(),
        }
    }

    /// Advice for `label`, or the fallback when the label is unknown
    pub fn lookup(&self, label: &str) -> &Treatment {
        self.entries.get(label).unwrap_or(&self.fallback)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    /// Known labels, sorted
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        labels.sort_unstable();
        labels
    }
}

const BLACK_SIGATOKA_ENGLISH: &[&str] = &[
    "1. Remove infected leaves and destroy them to reduce spore sources.",
    "2. Apply fungicides like mancozeb or propiconazole on a regular schedule, alternating between different fungicide groups to prevent resistance.",
    "3. Improve air circulation through proper plant spacing and reduce leaf wetness with improved drainage.",
    "4. Use resistant banana varieties like FHIA-17 or FHIA-23 when possible.",
    "5. Maintain weed-free areas around plants to improve air flow.",
    "6. Implement early warning systems to detect disease before widespread infection occurs.",
    "7. Ensure proper plant nutrition with balanced fertilization to increase plant resistance.",
];

const BLACK_SIGATOKA_SINHALA: &[&str] = &[
    "1. ආසාදිත කොළ ඉවත් කර විනාශ කරන්න, එමඟින් බීජාණු ප්‍රභවයන් අඩු කරන්න.",
    "2. Mancozeb හෝ Propiconazole වැනි දිලීර නාශක නිතිපතා යෙදීම, ප්‍රතිරෝධතාවය වැළැක්වීමට විවිධ දිලීර නාශක කණ්ඩායම් මාරුවෙන් මාරුවට යොදන්න.",
    "3. නිසි පැළ පරතරය තුළින් වාතය හොඳින් ගලා යාමට සහ වැඩිදියුණු කළ ජලාපවහනය සමඟ කොළ තෙතමනය අඩු කරන්න.",
    "4. FHIA-17 හෝ FHIA-23 වැනි ප්‍රතිරෝධී කෙසෙල් වර්ග හැකි විට භාවිතා කරන්න.",
    "5. වාතය ගලා යාම වැඩිදියුණු කිරීමට පැළ වටා වල් පැළෑටි නොමැති ප්‍රදේශ පවත්වාගෙන යන්න.",
    "6. පුළුල් ලෙස ආසාදනය වීමට පෙර රෝගය හඳුනා ගැනීමට පූර්ව අනතුරු ඇඟවීමේ පද්ධති ක්‍රියාත්මක කරන්න.",
    "7. පැළවල ප්‍රතිරෝධක හැකියාව වැඩි කිරීමට සමතුලිත පොහොර යෙදීම සමඟ නිසි පැළ පෝෂණය සහතික කරන්න.",
];

const PANAMA_ENGLISH: &[&str] = &[
    "1. Use certified disease-free planting materials from trusted agricultural authorities.",
    "2. Implement strict quarantine measures - avoid moving soil or plants from infected areas and disinfect tools, equipment, and footwear.",
    "3. Maintain proper drainage and soil management to prevent waterlogging and raise soil pH where appropriate.",
    "4. Apply biological control methods like Trichoderma spp. and organic amendments that promote beneficial soil microbes.",
    "5. For severe infections, consider leaving land fallow or planting non-host crops for several years.",
    "6. Plant resistant varieties (particularly against Tropical Race 4) where available.",
    "7. Avoid wounding plants during cultivation to prevent entry points for the pathogen.",
];

const PANAMA_SINHALA: &[&str] = &[
    "1. විශ්වාසදායක කෘෂිකාර්මික අධිකාරීන්ගෙන් සහතික කළ රෝග රහිත පැළ ද්‍රව්‍ය භාවිතා කරන්න.",
    "2. දැඩි නිරෝධායන පියවර ක්‍රියාත්මක කරන්න - ආසාදිත ප්‍රදේශවලින් පස හෝ පැළ ගෙන යාමෙන් වළකින්න, මෙවලම්, උපකරණ සහ පාවහන් විෂබීජහරණය කරන්න.",
    "3. ජල ගැලීම වැළැක්වීමට නිසි ජලාපවහනය සහ පස කළමනාකරණය පවත්වා ගෙන යන්න, සුදුසු තැන්වල පසේ pH අගය ඉහළ නැංවීමට හුණු යොදන්න.",
    "4. Trichoderma spp. වැනි ජීව විද්‍යාත්මක පාලන ක්‍රම සහ ප්‍රයෝජනවත් පාංශු ක්ෂුද්‍ර ජීවීන් ප්‍රවර්ධනය කරන කාබනික සංයෝජන යොදන්න.",
    "5. දරුණු ආසාදන සඳහා, වසර කිහිපයක් සඳහා ඉඩම් හිස්ව තැබීම හෝ ආශ්‍රිත නොවන බෝග වගා කිරීම සලකා බලන්න.",
    "6. ලබා ගත හැකි තැන්වල ප්‍රතිරෝධී ප්‍රභේද (විශේෂයෙන් ට්‍රොපිකල් රේස් 4 වලට එරෙහිව) සිටුවන්න.",
    "7. රෝග කාරකයට ඇතුළු වීමේ ස්ථාන වැළැක්වීම සඳහා වගාව අතරතුර පැළ තුවාල කිරීමෙන් වළකින්න.",
];

const HEALTHY_ENGLISH: &[&str] = &[
    "Your banana plant appears healthy! Continue these practices to maintain health:",
    "1. Maintain proper irrigation schedules - water deeply but infrequently to encourage deep root growth.",
    "2. Apply balanced fertilization with appropriate N-P-K ratios for each growth stage.",
    "3. Implement regular pest monitoring and integrated pest management practices.",
    "4. Prune excess suckers, leaving only 1-2 strong followers per mat.",
    "5. Remove old, dead leaves and maintain good field sanitation.",
    "6. Apply mulch to conserve moisture and suppress weeds.",
    "7. Conduct regular visual inspections for early disease detection.",
];

const HEALTHY_SINHALA: &[&str] = &[
    "ඔබේ කෙසෙල් පැළ සෞඛ්‍ය සම්පන්නයි! සෞඛ්‍ය තත්ත්වය පවත්වා ගැනීම සඳහා මෙම භාවිතයන් දිගටම කරගෙන යන්න:",
    "1. නිසි වාරි ජල කාලසටහන් පවත්වා ගන්න - ගැඹුරු මුල් වර්ධනය දිරිමත් කිරීම සඳහා ගැඹුරින් නමුත් කලාතුරකින් ජලය දෙන්න.",
    "2. එක් එක් වර්ධන අදියර සඳහා සුදුසු N-P-K අනුපාත සහිත සමතුලිත පොහොර යෙදීම සිදු කරන්න.",
    "3. නිතිපතා පළිබෝධ නිරීක්ෂණය සහ සමන්විත පළිබෝධ කළමනාකරණ භාවිතයන් ක්‍රියාත්මක කරන්න.",
    "4. අතිරික්ත පැළ ඉවත් කරන්න, එක් පැළයක ශක්තිමත් අනුගාමිකයින් 1-2 ක් පමණක් තබා ගන්න.",
    "5. පැරණි, මළ කොළ ඉවත් කර හොඳ ක්ෂේත්‍ර සනීපාරක්ෂාව පවත්වා ගන්න.",
    "6. තෙතමනය සංරක්ෂණය කිරීමට සහ වල් පැළෑටි මැඩපැවැත්වීමට වසුන් යොදන්න.",
    "7. රෝග කල් තියා හඳුනා ගැනීම සඳහා නියමිත කාලීනව දෘශ්‍ය පරීක්ෂා සිදු කරන්න.",
];
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_class_has_advice() {
        let catalog = TreatmentCatalog::new();
        for label in CLASS_NAMES {
            assert!(catalog.contains(label));
            let treatment = catalog.lookup(label);
            assert_eq!(treatment.english.len(), treatment.sinhala.len());
            assert!(!treatment.english.is_empty());
            assert!(treatment.english.iter().all(|line| !line.is_empty()));
        }
        assert_eq!(catalog.labels().len(), CLASS_NAMES.len());
    }

    #[test]
    fn test_unknown_label_falls_back() {
        let catalog = TreatmentCatalog::new();
        let treatment = catalog.lookup("Banana Moko Disease");
        assert_eq!(treatment, &Treatment::fallback());
        assert_eq!(treatment.english, vec!["No treatment available".to_string()]);
        assert!(!catalog.lookup("").is_empty());
    }

    #[test]
    fn test_lookup_is_exact_match() {
        let catalog = TreatmentCatalog::new();
        assert_eq!(
            catalog.lookup("banana healthy leaf"),
            &Treatment::fallback()
        );
        assert!(catalog.lookup("Banana Healthy Leaf").english[0].starts_with("Your banana plant"));
    }

    #[test]
    fn test_serialises_with_language_keys() {
        let json = serde_json::to_value(Treatment::fallback()).unwrap();
        assert_eq!(json["english"][0], "No treatment available");
        assert_eq!(json["sinhala"][0], "චිකිත්සා ලබා නොමැත");
    }
}
