use serde::Serialize;

/// Reference notes shown next to a prediction.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct DiseaseInfo {
    pub symptoms: &'static str,
    pub causes: &'static str,
    pub prevention: &'static str,
}

impl DiseaseInfo {
    /// Shown for a class name with no entry in the table.
    pub const UNKNOWN: DiseaseInfo = DiseaseInfo {
        symptoms: "Information not available.",
        causes: "Information not available.",
        prevention: "Information not available.",
    };
}

#[derive(Debug, Clone, Copy)]
pub struct Disease {
    pub name: &'static str,
    pub info: DiseaseInfo,
}

// Order matches the classifier output.
pub static DISEASES: [Disease; 10] = [
    Disease {
        name: "Bacterial Spot",
        info: DiseaseInfo {
            symptoms: "Small, dark, water-soaked, circular spots on leaves, stems, and fruits.",
            causes: "Caused by Xanthomonas bacteria, spread by water splashes and contaminated seeds.",
            prevention: "Use disease-free seeds, practice crop rotation, and avoid overhead irrigation.",
        },
    },
    Disease {
        name: "Early Blight",
        info: DiseaseInfo {
            symptoms: "Dark brown spots with concentric rings on lower leaves, which may turn yellow and drop.",
            causes: "Caused by the fungus Alternaria solani, favored by warm and humid conditions.",
            prevention: "Remove infected plant debris, improve air circulation, and use fungicides if necessary.",
        },
    },
    Disease {
        name: "Late Blight",
        info: DiseaseInfo {
            symptoms: "Water-soaked spots on leaves, rapidly enlarging and turning brown with fuzzy white growth.",
            causes: "Caused by the oomycete Phytophthora infestans, thrives in cool and moist conditions.",
            prevention: "Plant resistant varieties, improve drainage, and apply fungicides preventively.",
        },
    },
    Disease {
        name: "Leaf Mold",
        info: DiseaseInfo {
            symptoms: "Pale green to yellow spots on upper leaf surfaces, with olive green to gray fuzzy growth underneath.",
            causes: "Caused by the fungus Passalora fulva, favored by high humidity and moderate temperatures.",
            prevention: "Improve air circulation, reduce humidity, and remove infected leaves.",
        },
    },
    Disease {
        name: "Septoria Leaf Spot",
        info: DiseaseInfo {
            symptoms: "Small, circular spots with dark borders and light centers, often with tiny black fruiting bodies.",
            causes: "Caused by the fungus Septoria lycopersici, spreads through water splashes and contaminated tools.",
            prevention: "Practice crop rotation, remove infected plant debris, and use fungicides if needed.",
        },
    },
    Disease {
        name: "Spider Mites",
        info: DiseaseInfo {
            symptoms: "Tiny yellow or brown spots on leaves, fine webbing on undersides of leaves, and stunted growth.",
            causes: "Caused by various species of spider mites, thriving in hot and dry conditions.",
            prevention: "Increase humidity, use predatory mites, and apply horticultural oils or insecticidal soaps.",
        },
    },
    Disease {
        name: "Target Spot",
        info: DiseaseInfo {
            symptoms: "Brown, circular lesions with concentric rings on leaves, stems, and fruits.",
            causes: "Caused by the fungus Corynespora cassiicola, favored by warm and humid conditions.",
            prevention: "Improve air circulation, avoid overhead watering, and apply fungicides if necessary.",
        },
    },
    Disease {
        name: "Yellow Leaf Curl Virus",
        info: DiseaseInfo {
            symptoms: "Yellowing and upward curling of leaves, stunted growth, and reduced fruit production.",
            causes: "Caused by a complex of viruses, transmitted by whiteflies.",
            prevention: "Use resistant varieties, control whitefly populations, and remove infected plants.",
        },
    },
    Disease {
        name: "Mosaic Virus",
        info: DiseaseInfo {
            symptoms: "Mottled light and dark green patches on leaves, distorted leaf growth, and stunted plants.",
            causes: "Caused by various viruses, often spread by aphids or contaminated tools.",
            prevention: "Use virus-free seeds, control aphid populations, and practice good sanitation.",
        },
    },
    Disease {
        name: "Healthy",
        info: DiseaseInfo {
            symptoms: "No visible symptoms of disease.",
            causes: "N/A",
            prevention: "Maintain good cultural practices, including proper watering, fertilization, and pest management.",
        },
    },
];

pub fn class_names() -> Vec<&'static str> {
    DISEASES.iter().map(|d| d.name).collect()
}

pub fn by_index(index: usize) -> Option<&'static Disease> {
    DISEASES.get(index)
}

pub fn by_name(name: &str) -> Option<&'static Disease> {
    DISEASES.iter().find(|d| d.name == name)
}

pub fn info_for(name: &str) -> DiseaseInfo {
    by_name(name).map(|d| d.info).unwrap_or(DiseaseInfo::UNKNOWN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_order() {
        let names = class_names();
        assert_eq!(names.len(), 10);
        assert_eq!(names[0], "Bacterial Spot");
        assert_eq!(names[7], "Yellow Leaf Curl Virus");
        assert_eq!(names[9], "Healthy");
    }

    #[test]
    fn test_lookup() {
        assert_eq!(by_index(2).map(|d| d.name), Some("Late Blight"));
        assert!(by_index(10).is_none());

        assert_eq!(by_name("Leaf Mold").map(|d| d.name), Some("Leaf Mold"));
        assert!(by_name("Powdery Mildew").is_none());
    }

    #[test]
    fn test_info_falls_back_for_unknown_names() {
        let info = info_for("Early Blight");
        assert!(info.symptoms.starts_with("Dark brown spots with concentric rings"));

        let unknown = info_for("Class 12");
        assert_eq!(unknown.symptoms, "Information not available.");
        assert_eq!(unknown.causes, "Information not available.");
        assert_eq!(unknown.prevention, "Information not available.");
    }
}
